//! Persisting trees, roadmaps and recovered plans
//!
//! Everything is written as polylines. `Map` files hold one `x y` row per
//! vertex with a blank line after every polyline; `Obj` files hold `v`
//! records followed by one `l` record per polyline.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::node::NodeRef;
use super::problem::FileType;
use super::recovery::PathMatrix;
use super::tree::Forest;
use crate::common::{NearestNeighborIndex, PlanningResult, Point};

/// `dir/name` becomes `dir/<prefix>name`
pub fn prefix_file_name(path: &Path, prefix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => {
            let mut prefixed = OsString::from(prefix);
            prefixed.push(name);
            path.with_file_name(prefixed)
        }
        None => path.join(prefix),
    }
}

pub fn write_polylines<W: Write>(out: &mut W, file_type: FileType, polylines: &[Vec<Point>]) -> io::Result<()> {
    match file_type {
        FileType::Map => {
            for line in polylines {
                for p in line {
                    writeln!(out, "{} {}", p.x, p.y)?;
                }
                writeln!(out)?;
            }
        }
        FileType::Obj => {
            let mut next_vertex = 1;
            for line in polylines {
                for p in line {
                    writeln!(out, "v {} {} 0", p.x, p.y)?;
                }
                let indices: Vec<String> = (next_vertex..next_vertex + line.len())
                    .map(|i| i.to_string())
                    .collect();
                writeln!(out, "l {}", indices.join(" "))?;
                next_vertex += line.len();
            }
        }
    }
    Ok(())
}

/// Parent to child edge of every node
pub fn tree_edges<I: NearestNeighborIndex + Default>(forest: &Forest<I>) -> Vec<Vec<Point>> {
    forest
        .trees()
        .iter()
        .flat_map(|tree| {
            tree.nodes().iter().filter_map(move |node| {
                node.closest
                    .map(|parent| vec![tree.node(parent).position, node.position])
            })
        })
        .collect()
}

/// Every mutual visibility link between trees, once
pub fn roadmap_edges<I: NearestNeighborIndex + Default>(forest: &Forest<I>) -> Vec<Vec<Point>> {
    let mut edges = Vec::new();
    for tree in forest.trees() {
        for (index, node) in tree.nodes().iter().enumerate() {
            let own = NodeRef::new(tree.id(), index);
            for other in node.visible_nodes.keys().filter(|&&other| own < other) {
                edges.push(vec![node.position, forest.node(*other).position]);
            }
        }
    }
    edges
}

/// Recovered path of every connected root pair `i < j`
pub fn plan_polylines<I: NearestNeighborIndex + Default>(forest: &Forest<I>, matrix: &PathMatrix) -> Vec<Vec<Point>> {
    let n = matrix.size();
    let mut lines = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if matrix.is_connected(i, j) {
                lines.push(matrix.geometry(forest, i, j).points);
            }
        }
    }
    lines
}

fn save(path: &Path, file_type: FileType, polylines: &[Vec<Point>]) -> PlanningResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_polylines(&mut out, file_type, polylines)?;
    out.flush()?;
    Ok(())
}

pub fn save_trees<I: NearestNeighborIndex + Default>(path: &Path, file_type: FileType, forest: &Forest<I>) -> PlanningResult<()> {
    save(path, file_type, &tree_edges(forest))
}

pub fn save_roadmap<I: NearestNeighborIndex + Default>(path: &Path, file_type: FileType, forest: &Forest<I>) -> PlanningResult<()> {
    save(path, file_type, &roadmap_edges(forest))
}

pub fn save_plans<I: NearestNeighborIndex + Default>(
    path: &Path,
    file_type: FileType,
    forest: &Forest<I>,
    matrix: &PathMatrix,
) -> PlanningResult<()> {
    save(path, file_type, &plan_polylines(forest, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec<Point>> {
        vec![
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
            vec![Point::new(1.0, 1.0), Point::new(0.0, 1.0), Point::new(0.5, 2.0)],
        ]
    }

    #[test]
    fn test_prefix_keeps_directory() {
        let prefixed = prefix_file_name(Path::new("out/runs/tree.txt"), "iter_20_");
        assert_eq!(prefixed, PathBuf::from("out/runs/iter_20_tree.txt"));
        assert_eq!(
            prefix_file_name(Path::new("tree.txt"), "iter_1_"),
            PathBuf::from("iter_1_tree.txt")
        );
    }

    #[test]
    fn test_map_format() {
        let mut buf = Vec::new();
        write_polylines(&mut buf, FileType::Map, &square()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "0 0\n1 0\n\n1 1\n0 1\n0.5 2\n\n");
    }

    #[test]
    fn test_obj_format() {
        let mut buf = Vec::new();
        write_polylines(&mut buf, FileType::Obj, &square()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "v 0 0 0");
        assert_eq!(lines[2], "l 1 2");
        assert_eq!(lines[6], "l 3 4 5");
        assert_eq!(lines.iter().filter(|l| l.starts_with("v ")).count(), 5);
    }
}
