//! Antenna check and repair on global routes: check the routed metal,
//! insert diodes next to exposed gates, legalize them and reroute only the
//! nets that changed.

pub mod checker;
pub mod diodes;
pub mod wires;

pub use checker::{AntennaChecker, Violation};
pub use diodes::{DiodeInserter, DiodeMaster};

use crate::error::Result;
use crate::global_router::GlobalRouter;
use groute_common::db::core::DesignDB;
use groute_common::db::indices::NetId;
use groute_common::db::legalizer::PlacementLegalizer;
use groute_common::util::config::AntennaConfig;
use groute_common::util::profiler::ScopedTimer;
use std::collections::BTreeSet;

/// Counters of one repair pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub violations: usize,
    pub violating_nets: usize,
    pub diodes: usize,
    /// Diodes no nearby legal spot was found for.
    pub needs_legalizer: usize,
    /// Violations no diode count repairs.
    pub unrepaired: usize,
    pub rerouted: usize,
}

impl GlobalRouter {
    /// Checks the current routes, pin stubs included, against the antenna
    /// rules. The database is left as it was found.
    pub fn check_antennas(&self, db: &mut DesignDB, config: &AntennaConfig) -> Result<Vec<Violation>> {
        let _timer = ScopedTimer::new("Antenna check");
        let diode = DiodeMaster::resolve(db, config)?;

        let mut routes = self.routes().clone();
        wires::add_local_connections(&mut routes, self.nets());
        let replaced = wires::materialize(db, &routes);
        // Detail-routed nets are checked against their own wires.
        let nets: Vec<NetId> = routes.keys().copied().collect();

        let violations = AntennaChecker::new(
            db,
            config.ratio_margin,
            diode.diff_area,
            config.max_diode_count_per_gate,
        )
        .check_nets(&nets);
        wires::restore_wires(db, replaced);

        let violating: BTreeSet<NetId> = violations.iter().map(|v| v.net).collect();
        log::info!(
            "Found {} antenna violations on {} nets.",
            violations.len(),
            violating.len()
        );
        Ok(violations)
    }

    /// One check, diode insertion and incremental reroute pass.
    pub fn repair_antennas(
        &mut self,
        db: &mut DesignDB,
        config: &AntennaConfig,
        legalizer: &dyn PlacementLegalizer,
    ) -> Result<RepairSummary> {
        let _timer = ScopedTimer::new("Antenna repair");
        let mut summary = RepairSummary::default();
        if self.routes().is_empty() {
            log::warn!("No routes to check for antenna violations.");
            return Ok(summary);
        }

        let (min_layer, max_layer) = self.layer_range();
        let snapshot = self.snapshot(min_layer, max_layer)?;
        let violations = self.check_antennas(db, config)?;
        summary.violations = violations.len();
        summary.violating_nets = violations.iter().map(|v| v.net).collect::<BTreeSet<_>>().len();
        if violations.is_empty() {
            return Ok(summary);
        }

        let diode = DiodeMaster::resolve(db, config)?;
        let mut inserter = DiodeInserter::new(db, diode, config.legalize_retries, legalizer);
        inserter.freeze(db, &violations);
        inserter.build_index(db);
        for violation in &violations {
            if violation.diode_count == 0 {
                summary.unrepaired += 1;
                continue;
            }
            summary.diodes += inserter.insert(db, violation)?;
            self.mark_dirty(violation.net);
        }
        summary.needs_legalizer = inserter.needs_legalizer();
        inserter.finish(db)?;

        log::info!("Inserted {} diodes.", summary.diodes);
        if summary.needs_legalizer > 0 {
            log::warn!(
                "{} diodes could not be placed next to their gates.",
                summary.needs_legalizer
            );
        }
        if summary.unrepaired > 0 {
            log::warn!("{} antenna violations left unrepaired.", summary.unrepaired);
        }

        summary.rerouted = self.reroute_dirty(db, &snapshot)?;
        Ok(summary)
    }
}
