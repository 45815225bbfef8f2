use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use multi_root_planner::common::{Environment, NearestNeighborIndex, PlanningError, Point, Range};
use multi_root_planner::path_planning::environment::{EmptyEnvironment, ObstacleEnvironment};
use multi_root_planner::path_planning::multi_root::{
    FileStruct, FileType, MultiRootPlanner, NodeRef, Problem, SaveOptions, SolverType, TerminationReason,
};
use multi_root_planner::utils::RTreeIndex;

const EPS: f64 = 1e-9;

fn empty(range: Range) -> EmptyEnvironment {
    EmptyEnvironment::new(range)
}

fn chase(roots: Vec<Point>) -> Problem {
    Problem {
        roots,
        sampling_dist: 1.0,
        dist_tree: 2.0,
        priority_bias: 1.0,
        max_iterations: 1000,
        seed: 1,
        ..Default::default()
    }
}

/// Structural invariants that hold between any two iterations
fn assert_invariants<E: Environment, I: NearestNeighborIndex + Default>(planner: &MultiRootPlanner<E, I>) {
    let forest = planner.forest();
    for tree in forest.trees() {
        assert_eq!(tree.index_len(), tree.len());
        for node in tree.nodes() {
            match node.closest {
                Some(parent) => {
                    let parent = tree.node(parent);
                    let expected = parent.distance_to_root + parent.position.distance(&node.position);
                    assert!((node.distance_to_root - expected).abs() < EPS);
                }
                None => assert_eq!(node.distance_to_root, 0.0),
            }
            assert_eq!(node.expanded_root, tree.expanded_root());
        }
    }

    let roots: Vec<Point> = forest.trees().iter().map(|t| t.root().position).collect();
    for (i, j, cell) in planner.table().links() {
        let (a, b) = (cell.node1.unwrap(), cell.node2.unwrap());
        assert!(forest.node(a).id() <= forest.node(b).id());
        assert!(cell.distance + EPS >= roots[i].distance(&roots[j]));
        assert_eq!(planner.table().get(j, i).distance, cell.distance);

        if cell.is_direct() {
            let (n1, n2) = (forest.node(a), forest.node(b));
            let realized = n1.distance_to_root + n2.distance_to_root + n1.position.distance(&n2.position);
            assert!((cell.distance - realized).abs() < EPS);
        } else {
            let plan = cell.plan_refs(forest);
            assert_eq!(plan.first(), Some(&NodeRef::new(i, 0)));
            assert_eq!(plan.last(), Some(&NodeRef::new(j, 0)));
            let length: f64 = plan
                .windows(2)
                .map(|w| forest.node(w[0]).position.distance(&forest.node(w[1]).position))
                .sum();
            assert!((cell.distance - length).abs() < 1e-6);
        }
    }
}

#[test]
fn two_roots_meet_halfway() {
    let problem = chase(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem, empty(Range::new(-5.0, 15.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();

    assert_eq!(report.termination, TerminationReason::Connected);
    assert!(planner.table().exists(0, 1));
    let distance = planner.table().get(0, 1).distance;
    assert!(distance >= 10.0 - EPS && distance <= 12.0, "distance {}", distance);
    assert!((report.matrix.distance(0, 1) - distance).abs() < EPS);

    let path = report.matrix.geometry(planner.forest(), 0, 1);
    assert_eq!(path.points.first(), Some(&Point::new(0.0, 0.0)));
    assert!(path.points.last().unwrap().approx_eq(&Point::new(10.0, 0.0)));
    assert!((path.total_length() - distance).abs() < 1e-6);
    assert_invariants(&planner);
}

#[test]
fn two_roots_meet_halfway_uniform() {
    for seed in 1..=5 {
        let problem = Problem {
            priority_bias: 0.0,
            max_iterations: 20_000,
            seed,
            ..chase(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)])
        };
        let mut planner: MultiRootPlanner<_> =
            MultiRootPlanner::new(problem, empty(Range::new(-5.0, 15.0, -5.0, 5.0))).unwrap();
        let report = planner.solve().unwrap();

        assert_eq!(report.termination, TerminationReason::Connected, "seed {}", seed);
        let distance = planner.table().get(0, 1).distance;
        assert!(distance >= 10.0 - EPS && distance <= 12.0, "seed {} distance {}", seed, distance);
        assert_invariants(&planner);
    }
}

#[test]
fn collinear_roots_obey_triangle_inequality() {
    let problem = chase(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0)]);
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem, empty(Range::new(-5.0, 15.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();

    assert_eq!(report.termination, TerminationReason::Connected);
    assert!(report.matrix.is_complete());
    let m = &report.matrix;
    assert!(m.distance(0, 2) <= m.distance(0, 1) + m.distance(1, 2) + EPS);
    assert_eq!(m.distance(2, 0), m.distance(0, 2));
    assert!(planner.forest().fully_connected());

    let table = planner.table();
    assert!(table.is_complete());
    assert!(table.exists(0, 2));
    let (d01, d12, d02) = (table.get(0, 1).distance, table.get(1, 2).distance, table.get(0, 2).distance);
    assert!(d02 <= d01 + d12 + EPS);
    if !table.get(0, 2).is_direct() {
        assert_eq!(table.get(0, 2).via, vec![1]);
    }
    assert_invariants(&planner);
}

#[test]
fn wall_without_gap_saturates() {
    let range = Range::new(0.0, 10.0, 0.0, 3.0);
    let problem = Problem {
        roots: vec![Point::new(1.0, 1.5), Point::new(9.0, 1.5)],
        range: Some(range),
        sampling_dist: 1.0,
        dist_tree: 1.0,
        priority_bias: 0.0,
        max_iterations: 200_000,
        seed: 3,
        ..Default::default()
    };
    let env = ObstacleEnvironment::new(range, 0.1).with_wall(Point::new(5.0, -1.0), Point::new(5.0, 4.0));
    let mut planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, env).unwrap();
    let report = planner.solve().unwrap();

    assert_eq!(report.termination, TerminationReason::Saturated);
    assert!(report.iterations < 200_000);
    assert!(!planner.table().exists(0, 1));
    assert!(report.connections.is_empty());
    assert!(!report.matrix.is_connected(0, 1));
    for tree in planner.forest().trees() {
        assert!(tree.len() > 1);
        assert!(tree.nodes().iter().all(|n| n.is_saturated(3)));
    }
    assert_invariants(&planner);
}

#[test]
fn cancellation_keeps_links_found_so_far() {
    let problem = chase(vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(30.0, 0.0)]);
    let flag = Arc::new(AtomicBool::new(false));
    let mut planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, empty(Range::new(-5.0, 35.0, -5.0, 5.0)))
        .unwrap()
        .with_cancel_flag(flag.clone());

    while planner.connections().is_empty() {
        assert_eq!(planner.step().unwrap(), None);
        assert!(planner.iteration() < 50);
    }
    flag.store(true, Ordering::Relaxed);
    let stopped_at = planner.iteration();
    let report = planner.solve().unwrap();

    assert_eq!(report.termination, TerminationReason::Cancelled);
    assert_eq!(report.iterations, stopped_at);
    assert_eq!(report.connections.len(), 1);
    assert!(planner.table().exists(0, 1));
    assert!(!planner.table().exists(0, 2));
    assert!(report.matrix.is_connected(0, 1));
    assert!(!report.matrix.is_connected(1, 2));
    assert_invariants(&planner);
}

/// Index that refuses to hold more than three points
#[derive(Debug, Clone, Default)]
struct BoundedIndex(RTreeIndex);

impl NearestNeighborIndex for BoundedIndex {
    fn build(&mut self) -> Result<(), String> {
        self.0.build()
    }

    fn add(&mut self, points: &[Point]) -> Result<(), String> {
        if self.0.len() + points.len() > 3 {
            return Err("index is full".to_string());
        }
        self.0.add(points)
    }

    fn knn_search(&self, query: &Point, k: usize) -> (Vec<usize>, Vec<f64>) {
        self.0.knn_search(query, k)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn index_failure_stops_the_run() {
    let problem = chase(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    let mut planner =
        MultiRootPlanner::<_, BoundedIndex>::new(problem, empty(Range::new(-5.0, 15.0, -5.0, 5.0))).unwrap();

    // trees take turns, so tree 0 holds three nodes after iteration 2
    match planner.solve() {
        Err(PlanningError::Index { tree, iteration, reason }) => {
            assert_eq!((tree, iteration), (0, 4));
            assert_eq!(reason, "index is full");
        }
        other => panic!("expected an index error, got {:?}", other.map(|r| r.termination)),
    }
    assert_eq!(planner.forest().tree(0).len(), 3);
    assert_eq!(planner.forest().tree(1).len(), 3);
}

fn corridor(priority_bias: f64) -> Option<usize> {
    let range = Range::new(-2.0, 22.0, -6.0, 6.0);
    let problem = Problem {
        roots: vec![Point::new(0.0, 0.0)],
        goal: Some(Point::new(20.0, 0.0)),
        solver: SolverType::AStar,
        range: Some(range),
        priority_bias,
        max_iterations: 3000,
        seed: 7,
        ..Default::default()
    };
    let env = ObstacleEnvironment::new(range, 0.2)
        .with_wall(Point::new(5.0, 1.5), Point::new(15.0, 1.5))
        .with_wall(Point::new(5.0, -1.5), Point::new(15.0, -1.5))
        .with_wall(Point::new(5.0, 1.5), Point::new(5.0, 7.0))
        .with_wall(Point::new(5.0, -1.5), Point::new(5.0, -7.0));
    let mut planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, env).unwrap();
    let report = planner.solve().unwrap();
    assert_invariants(&planner);
    report.first_connection().map(|e| e.iteration)
}

#[test]
fn frontier_bias_reaches_goal_sooner() {
    let guided = corridor(1.0).expect("guided search connects");
    let unguided = corridor(0.0).unwrap_or(usize::MAX);
    assert!(guided < unguided, "guided {} vs unguided {}", guided, unguided);
}

#[test]
fn update_all_follows_shortened_depth() {
    let mut problem = chase(vec![Point::new(0.0, 0.0), Point::new(1.5, 0.0)]);
    problem.max_iterations = 1;
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem, empty(Range::new(-5.0, 5.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();

    assert_eq!(report.iterations, 1);
    assert!(planner.table().exists(0, 1));
    assert!((planner.table().get(0, 1).distance - 1.5).abs() < EPS);
    assert!(planner.forest().connected(0, 1));

    planner.forest_mut().node_mut(NodeRef::new(0, 1)).distance_to_root = 0.8;
    planner.update_pairwise();
    assert!((planner.table().get(0, 1).distance - 1.3).abs() < EPS);
}

fn cluttered(seed: u64) -> MultiRootPlanner<ObstacleEnvironment> {
    let range = Range::new(0.0, 20.0, 0.0, 20.0);
    let problem = Problem {
        roots: vec![Point::new(1.0, 1.0), Point::new(18.0, 2.0), Point::new(10.0, 18.0)],
        solver: SolverType::AStar,
        optimize: true,
        range: Some(range),
        priority_bias: 0.3,
        max_iterations: 400,
        seed,
        ..Default::default()
    };
    let env = ObstacleEnvironment::from_circles(range, &[(7.0, 7.0, 2.0), (13.0, 10.0, 2.5)], 0.2)
        .with_wall(Point::new(3.0, 12.0), Point::new(9.0, 12.0));
    let mut planner = MultiRootPlanner::new(problem, env).unwrap();
    planner.solve().unwrap();
    planner
}

#[test]
fn same_seed_same_forest() {
    let a = cluttered(11);
    let b = cluttered(11);

    for (ta, tb) in a.forest().trees().iter().zip(b.forest().trees()) {
        assert_eq!(ta.len(), tb.len());
        for (na, nb) in ta.nodes().iter().zip(tb.nodes()) {
            assert_eq!(na.id(), nb.id());
            assert_eq!(na.position.x.to_bits(), nb.position.x.to_bits());
            assert_eq!(na.position.y.to_bits(), nb.position.y.to_bits());
            assert_eq!(na.closest, nb.closest);
        }
    }
    let cells_a: Vec<_> = a.table().links().map(|(i, j, c)| (i, j, c.node1, c.node2, c.distance.to_bits())).collect();
    let cells_b: Vec<_> = b.table().links().map(|(i, j, c)| (i, j, c.node1, c.node2, c.distance.to_bits())).collect();
    assert_eq!(cells_a, cells_b);
}

#[test]
fn optimize_keeps_costs_consistent() {
    let planner = cluttered(5);
    assert_eq!(planner.iteration(), 400);
    assert_invariants(&planner);
}

#[test]
fn zero_iterations_leave_only_roots() {
    let mut problem = chase(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    problem.max_iterations = 0;
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem, empty(Range::new(-5.0, 15.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();

    assert_eq!(report.iterations, 0);
    assert_eq!(report.termination, TerminationReason::MaxIterations);
    assert!(planner.forest().trees().iter().all(|t| t.len() == 1));
    assert_eq!(planner.table().num_links(), 0);
}

#[test]
fn single_root_returns_immediately() {
    let problem = chase(vec![Point::new(1.0, 1.0)]);
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem.clone(), empty(Range::new(-5.0, 5.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.termination, TerminationReason::Connected);
    assert_eq!(planner.forest().num_nodes(), 1);

    let refining = Problem { optimize: true, ..problem };
    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(refining, empty(Range::new(-5.0, 5.0, -5.0, 5.0))).unwrap();
    let report = planner.solve().unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.termination, TerminationReason::Exhausted);
}

#[test]
fn problem_loads_from_json() {
    let json = r#"{
        "roots": [{"x": 0.0, "y": 0.0}, {"x": 4.0, "y": 0.0}],
        "goal": {"x": 2.0, "y": 3.0},
        "solver": "AStar",
        "priority_bias": 0.5,
        "save_opt": ["Tree"],
        "file_names": {"Tree": {"file_name": "out/tree.txt", "file_type": "Map"}},
        "save_freq": {"Tree": 10}
    }"#;
    let problem: Problem = serde_json::from_str(json).unwrap();

    assert_eq!(problem.num_roots(), 3);
    assert_eq!(problem.solver, SolverType::AStar);
    assert_eq!(problem.max_misses, 3);
    assert_eq!(problem.id, "Solver");
    assert_eq!(problem.save_freq.get(&SaveOptions::Tree), Some(&10));
    assert!(problem.validate().is_ok());

    let back: Problem = serde_json::from_str(&serde_json::to_string(&problem).unwrap()).unwrap();
    assert_eq!(back, problem);
}

#[test]
fn outputs_and_snapshots_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let tree_file = dir.path().join("tree.txt");
    let roadmap_file = dir.path().join("roadmap.txt");
    let plans_file = dir.path().join("plans.obj");

    let mut problem = chase(vec![Point::new(0.0, 0.0), Point::new(12.0, 0.0)]);
    problem.max_iterations = 10;
    problem.save_opt = vec![SaveOptions::Tree, SaveOptions::Roadmap, SaveOptions::Plans];
    problem.file_names.insert(SaveOptions::Tree, FileStruct::new(&tree_file, FileType::Map));
    problem.file_names.insert(SaveOptions::Roadmap, FileStruct::new(&roadmap_file, FileType::Map));
    problem.file_names.insert(SaveOptions::Plans, FileStruct::new(&plans_file, FileType::Obj));
    problem.save_freq.insert(SaveOptions::Tree, 5);

    let mut planner: MultiRootPlanner<_> =
        MultiRootPlanner::new(problem, empty(Range::new(-2.0, 14.0, -3.0, 3.0))).unwrap();
    let report = planner.solve().unwrap();
    planner.save_results().unwrap();

    assert!(report.matrix.is_connected(0, 1));
    assert!(dir.path().join("iter_5_tree.txt").exists());
    assert!(dir.path().join("iter_10_tree.txt").exists());
    assert!(!dir.path().join("iter_5_roadmap.txt").exists());

    let tree = fs::read_to_string(&tree_file).unwrap();
    // two lines of text and a separator per edge
    let edges = planner.forest().num_nodes() - planner.forest().len();
    assert_eq!(tree.lines().count(), 3 * edges);

    assert!(!fs::read_to_string(&roadmap_file).unwrap().is_empty());
    let plans = fs::read_to_string(&plans_file).unwrap();
    assert_eq!(plans.lines().filter(|l| l.starts_with("l ")).count(), 1);
}

#[test]
fn invalid_configuration_fails_fast() {
    let problem = Problem {
        roots: vec![Point::new(0.0, 0.0)],
        sampling_dist: -1.0,
        ..Default::default()
    };
    let result = MultiRootPlanner::<_, RTreeIndex>::new(problem, empty(Range::new(-1.0, 1.0, -1.0, 1.0)));
    assert!(result.is_err());

    let no_roots = Problem::default();
    assert!(MultiRootPlanner::<_, RTreeIndex>::new(no_roots, empty(Range::new(-1.0, 1.0, -1.0, 1.0))).is_err());
}
