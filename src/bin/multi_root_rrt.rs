// Multi-root RRT between five inspection sites
//
// Run with RUST_LOG=debug to follow links and merges as they happen.

use std::fs;

use tracing::info;
use tracing_subscriber::EnvFilter;

use multi_root_planner::common::{Point, PlanningResult, Range, TourSolver};
use multi_root_planner::path_planning::environment::{CircleObstacle, ObstacleEnvironment};
use multi_root_planner::path_planning::multi_root::{
    tour_length, FileStruct, FileType, MultiRootPlanner, NearestNeighborTour, Problem, SaveOptions, SolverType,
};
use multi_root_planner::utils::Visualizer;

fn main() -> PlanningResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let crate_dir = env!("CARGO_MANIFEST_DIR");
    let out_dir = format!("{}/img", crate_dir);
    fs::create_dir_all(&out_dir)?;

    let range = Range::new(-2.0, 32.0, -2.0, 22.0);
    let env = ObstacleEnvironment::new(range, 0.2)
        .with_circle(CircleObstacle::new(8.0, 10.0, 2.5))
        .with_circle(CircleObstacle::new(20.0, 6.0, 3.0))
        .with_circle(CircleObstacle::new(22.0, 15.0, 2.0))
        .with_wall(Point::new(14.0, -2.0), Point::new(14.0, 12.0))
        .with_wall(Point::new(14.0, 16.0), Point::new(26.0, 16.0));

    let mut problem = Problem {
        roots: vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 18.0),
            Point::new(28.0, 2.0),
            Point::new(28.0, 20.0),
        ],
        goal: Some(Point::new(16.0, 20.0)),
        solver: SolverType::AStar,
        priority_bias: 0.4,
        dist_tree: 2.0,
        sampling_dist: 1.0,
        max_iterations: 20_000,
        seed: 42,
        id: "multi_root_rrt".to_string(),
        ..Default::default()
    };
    problem.save_opt = vec![SaveOptions::Tree, SaveOptions::Plans];
    problem.file_names.insert(
        SaveOptions::Tree,
        FileStruct::new(format!("{}/multi_root_tree.txt", out_dir), FileType::Map),
    );
    problem.file_names.insert(
        SaveOptions::Plans,
        FileStruct::new(format!("{}/multi_root_plans.obj", out_dir), FileType::Obj),
    );
    let roots = problem.all_roots();

    let mut planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, env)?;
    let report = planner.solve()?;
    planner.save_results()?;

    info!(
        iterations = report.iterations,
        termination = %report.termination,
        links = report.connections.len(),
        "planning done"
    );
    for event in &report.connections {
        println!(
            "iteration {:>5}: roots {} and {} linked, distance {:.2}",
            event.iteration, event.i, event.j, event.distance
        );
    }

    let distances = report.matrix.distance_matrix();
    println!("Distance matrix:{}", distances);
    if report.matrix.is_complete() {
        let tour = NearestNeighborTour::default().solve(&distances);
        println!("Tour {:?}, length {:.2}", tour, tour_length(&distances, &tour));
    } else {
        println!("Some roots could not be connected, no tour");
    }

    let mut vis = Visualizer::new();
    vis.set_title("Multi-root RRT").set_range(&range);
    vis.plot_environment(planner.environment(), &range)
        .plot_forest(planner.forest())
        .plot_roadmap(planner.forest());
    for i in 0..roots.len() {
        for j in i + 1..roots.len() {
            vis.plot_plan(planner.forest(), &report.matrix, i, j);
        }
    }
    vis.plot_roots(&roots);
    vis.save_svg(&format!("{}/multi_root_rrt.svg", out_dir))?;

    Ok(())
}
