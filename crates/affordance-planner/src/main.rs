//! Affordance planner demo binary
//!
//! Plans on the grid-world demo (size and slip from `AFFORD_GRID_SIZE` and
//! `AFFORD_SLIP`) with and without affordance pruning and reports the Bellman
//! backups each planner needed.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use affordance_core::{AffordancePruningController, KnowledgeBase, LoadOptions};
use affordance_planner::{
    config::PlannerConfig,
    gridworld::{GridDomain, GridState, GridWorld},
    BoundedRtdp, FullActionSet, Rtdp, ValueIteration, PLANNER_VERSION,
};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting affordance planner v{}", PLANNER_VERSION);

    let config = PlannerConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let size = config.grid_size;
    let world = GridWorld::new(size, size, (size - 1, size - 1)).with_slip(config.slip);
    let domain = world.domain();
    let start = GridState::new(0, 0);
    let mdp = world.mdp(config.gamma)?;

    // Value iteration
    let mut full_vi = ValueIteration::new(
        mdp.clone(),
        FullActionSet::from_domain(&domain),
        config.value_iteration.clone(),
        config.seed,
    );
    let full_vi_report = full_vi.plan_from_state(&start)?;

    let mut pruned_vi = ValueIteration::new(
        mdp.clone(),
        build_controller(&config, &world, &domain)?,
        config.value_iteration.clone(),
        config.seed,
    );
    let pruned_vi_report = pruned_vi.plan_from_state(&start)?;

    info!(
        "Value iteration: full={} backups over {} states, pruned={} backups over {} states",
        full_vi_report.bellman_updates,
        full_vi.discovered_states().len(),
        pruned_vi_report.bellman_updates,
        pruned_vi.discovered_states().len()
    );
    info!(
        "V(start): full={:.4}, pruned={:.4}",
        full_vi.value(&start),
        pruned_vi.value(&start)
    );

    // RTDP
    let mut full_rtdp = Rtdp::new(
        mdp.clone(),
        FullActionSet::from_domain(&domain),
        config.rtdp.clone(),
        config.seed,
    );
    let full_rtdp_report = full_rtdp.plan_from_state(&start);

    let mut pruned_rtdp = Rtdp::new(
        mdp.clone(),
        build_controller(&config, &world, &domain)?,
        config.rtdp.clone(),
        config.seed,
    );
    let pruned_rtdp_report = pruned_rtdp.plan_from_state(&start);

    // Bounded RTDP
    let mut full_brtdp = BoundedRtdp::new(
        mdp.clone(),
        FullActionSet::from_domain(&domain),
        config.bounded_rtdp.clone(),
        config.seed,
    );
    let full_brtdp_report = full_brtdp.plan_from_state(&start);

    let mut pruned_brtdp = BoundedRtdp::new(
        mdp,
        build_controller(&config, &world, &domain)?,
        config.bounded_rtdp.clone(),
        config.seed,
    );
    let pruned_brtdp_report = pruned_brtdp.plan_from_state(&start);

    info!(
        "RTDP: full={} backups in {} rollouts, pruned={} backups in {} rollouts",
        full_rtdp_report.bellman_updates,
        full_rtdp_report.rollouts,
        pruned_rtdp_report.bellman_updates,
        pruned_rtdp_report.rollouts
    );
    info!(
        "Bounded RTDP: full={} backups (margin {:.4}), pruned={} backups (margin {:.4})",
        full_brtdp_report.bellman_updates,
        full_brtdp_report.final_margin,
        pruned_brtdp_report.bellman_updates,
        pruned_brtdp_report.final_margin
    );

    let summary = serde_json::json!({
        "policy": config.pruning.policy,
        "prior_source": config.pruning.prior_source,
        "grid_size": config.grid_size,
        "slip": config.slip,
        "value_iteration": {
            "full": full_vi_report,
            "pruned": pruned_vi_report,
            "pruning_stats": pruned_vi.provider().stats(),
        },
        "rtdp": {
            "full": full_rtdp_report,
            "pruned": pruned_rtdp_report,
            "pruning_stats": pruned_rtdp.provider().stats(),
        },
        "bounded_rtdp": {
            "full": full_brtdp_report,
            "pruned": pruned_brtdp_report,
            "pruning_stats": pruned_brtdp.provider().stats(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Controller over the configured knowledge base, or the demo one
fn build_controller(
    config: &PlannerConfig,
    world: &GridWorld,
    domain: &GridDomain,
) -> Result<AffordancePruningController<GridState>> {
    let options = LoadOptions {
        expert: config.expert_knowledge_base,
        expert_total_count: config.pruning.expert_total_count,
    };

    let kb = match &config.knowledge_base_path {
        Some(path) => KnowledgeBase::load_file(domain, &HashMap::new(), path, options)
            .with_context(|| format!("loading knowledge base {}", path.display()))?,
        None => world.demo_knowledge_base(domain, options)?,
    };
    info!("Knowledge base: {} affordances", kb.len());

    let mut controller = AffordancePruningController::new(kb.into_delegates(), config.pruning.clone())?;
    controller.set_current_goal(world.goal_expression(domain));
    Ok(controller)
}
