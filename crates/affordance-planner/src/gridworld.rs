//! Grid-world demo domain
//!
//! An agent moves on a `width × height` grid towards a goal cell. Moves
//! (`north`, `south`, `east`, `west`) slip with a configurable probability,
//! leaving the agent in place; `wait` and `spin` never move it. Walls and the
//! grid boundary block movement.
//!
//! Predicates locate the goal relative to the agent (`goal_north`,
//! `goal_south`, `goal_east`, `goal_west`) and detect it (`at_goal`). The demo
//! knowledge base ties each relative-goal predicate to the moves that close
//! the distance.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use affordance_common::{
    Action, ActionKey, AffordanceError, Domain, FnPropositionalFunction, GroundedProp, LoadError,
    LogicalExpression, PfAtom, PlannerError, PropositionalFunction, TransitionProbability,
};
use affordance_core::{AffordancePruningController, KnowledgeBase, LoadOptions, PruningConfig};
use serde::{Deserialize, Serialize};

use crate::domain::mdp::Mdp;

/// Agent position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridState {
    pub x: i32,
    pub y: i32,
}

impl GridState {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Grid layout and dynamics
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    goal: GridState,
    walls: HashSet<GridState>,
    slip: f64,
}

impl GridWorld {
    pub fn new(width: i32, height: i32, goal: (i32, i32)) -> Self {
        Self {
            width,
            height,
            goal: GridState::new(goal.0, goal.1),
            walls: HashSet::new(),
            slip: 0.0,
        }
    }

    /// Probability that a move leaves the agent in place
    pub fn with_slip(mut self, slip: f64) -> Self {
        self.slip = slip.clamp(0.0, 1.0);
        self
    }

    pub fn with_wall(mut self, x: i32, y: i32) -> Self {
        self.walls.insert(GridState::new(x, y));
        self
    }

    pub fn goal(&self) -> GridState {
        self.goal
    }

    pub fn is_open(&self, cell: &GridState) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && cell.x < self.width
            && cell.y < self.height
            && !self.walls.contains(cell)
    }

    pub fn domain(&self) -> GridDomain {
        GridDomain::new(Arc::new(self.clone()))
    }

    /// Unit step cost, terminal at the goal
    pub fn mdp(&self, gamma: f64) -> Result<Mdp<GridState>, PlannerError> {
        let goal = self.goal;
        Mdp::new(
            Arc::new(|_: &GridState, _: &ActionKey, _: &GridState| -1.0),
            Arc::new(move |s: &GridState| *s == goal),
            gamma,
        )
    }

    /// The `at_goal` expression used as the planning goal
    pub fn goal_expression(&self, domain: &GridDomain) -> Arc<dyn LogicalExpression<GridState>> {
        domain.atom(AT_GOAL)
    }

    /// Demo knowledge base parsed against `domain`
    pub fn demo_knowledge_base(
        &self,
        domain: &GridDomain,
        options: LoadOptions,
    ) -> Result<KnowledgeBase<GridState>, LoadError> {
        KnowledgeBase::parse(domain, &HashMap::new(), DEMO_KNOWLEDGE_BASE, options)
    }

    /// Pruning controller over the demo knowledge base, goal already set
    pub fn demo_controller(
        &self,
        domain: &GridDomain,
        config: PruningConfig,
    ) -> Result<AffordancePruningController<GridState>, AffordanceError> {
        let options = LoadOptions {
            expert: false,
            expert_total_count: config.expert_total_count,
        };
        let kb = self.demo_knowledge_base(domain, options)?;
        let mut controller = AffordancePruningController::new(kb.into_delegates(), config)?;
        controller.set_current_goal(self.goal_expression(domain));
        Ok(controller)
    }
}

const AT_GOAL: &str = "at_goal";

/// Each relative-goal affordance is active whenever the moves it names are
/// optimal and half the time for the perpendicular moves. `wait` and `spin`
/// are never optimal.
pub const DEMO_KNOWLEDGE_BASE: &str = "\
goal_east,at_goal
north,50,100
south,50,100
east,100,100
west,0,100
wait,0,0
spin,0,0
===
goal_west,at_goal
north,50,100
south,50,100
east,0,100
west,100,100
wait,0,0
spin,0,0
===
goal_north,at_goal
north,100,100
south,0,100
east,50,100
west,50,100
wait,0,0
spin,0,0
===
goal_south,at_goal
north,0,100
south,100,100
east,50,100
west,50,100
wait,0,0
spin,0,0
===
";

/// A move by `(dx, dy)`
struct Move {
    name: String,
    dx: i32,
    dy: i32,
    world: Arc<GridWorld>,
}

impl Action<GridState> for Move {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_classes(&self) -> &[String] {
        &[]
    }

    fn transitions(&self, state: &GridState, _params: &[String]) -> Vec<TransitionProbability<GridState>> {
        let target = GridState::new(state.x + self.dx, state.y + self.dy);
        if target == *state || !self.world.is_open(&target) {
            return vec![TransitionProbability::certain(*state)];
        }
        if self.world.slip <= 0.0 {
            return vec![TransitionProbability::certain(target)];
        }
        vec![
            TransitionProbability::new(target, 1.0 - self.world.slip),
            TransitionProbability::new(*state, self.world.slip),
        ]
    }
}

/// Action and predicate registry of a [`GridWorld`]
pub struct GridDomain {
    actions: Vec<Arc<dyn Action<GridState>>>,
    predicates: HashMap<String, Arc<dyn PropositionalFunction<GridState>>>,
}

impl GridDomain {
    fn new(world: Arc<GridWorld>) -> Self {
        let moves = [
            ("north", 0, 1),
            ("south", 0, -1),
            ("east", 1, 0),
            ("west", -1, 0),
            ("wait", 0, 0),
            ("spin", 0, 0),
        ];
        let actions = moves
            .iter()
            .map(|&(name, dx, dy)| {
                Arc::new(Move {
                    name: name.to_string(),
                    dx,
                    dy,
                    world: Arc::clone(&world),
                }) as Arc<dyn Action<GridState>>
            })
            .collect();

        let goal = world.goal;
        let tests: [(&str, Box<dyn Fn(&GridState) -> bool + Send + Sync>); 5] = [
            (AT_GOAL, Box::new(move |s: &GridState| *s == goal)),
            ("goal_north", Box::new(move |s: &GridState| goal.y > s.y)),
            ("goal_south", Box::new(move |s: &GridState| goal.y < s.y)),
            ("goal_east", Box::new(move |s: &GridState| goal.x > s.x)),
            ("goal_west", Box::new(move |s: &GridState| goal.x < s.x)),
        ];
        let predicates = tests
            .into_iter()
            .map(|(name, test)| {
                let pf: Arc<dyn PropositionalFunction<GridState>> = Arc::new(
                    FnPropositionalFunction::<GridState>::new(name, vec!["agent".to_string()], move |s, _| test(s)),
                );
                (name.to_string(), pf)
            })
            .collect();

        Self {
            actions,
            predicates,
        }
    }

    /// Free-variable atom over the named predicate
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a grid-world predicate.
    fn atom(&self, name: &str) -> Arc<dyn LogicalExpression<GridState>> {
        let pf = Arc::clone(&self.predicates[name]);
        Arc::new(PfAtom::new(GroundedProp::with_free_variables(pf)))
    }
}

impl Domain<GridState> for GridDomain {
    fn action(&self, name: &str) -> Option<Arc<dyn Action<GridState>>> {
        self.actions.iter().find(|a| a.name() == name).cloned()
    }

    fn propositional_function(&self, name: &str) -> Option<Arc<dyn PropositionalFunction<GridState>>> {
        self.predicates.get(name).cloned()
    }

    fn actions(&self) -> Vec<Arc<dyn Action<GridState>>> {
        self.actions.clone()
    }
}
