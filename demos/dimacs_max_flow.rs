use max_flow::{MaxFlow, ReverseArcGraph, Status};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;

// Solves a maximum flow instance in DIMACS format:
//   p max <num_nodes> <num_arcs>
//   n <node> s|t
//   a <tail> <head> <capacity>
// Node ids are 1-based.
fn main() {
    let args: Vec<String> = env::args().collect();
    let input_file = &args[1];

    let mut num_nodes = 0;
    let mut source = 0;
    let mut sink = 0;
    let mut arcs: Vec<(usize, usize, i64)> = Vec::new();
    for result in BufReader::new(File::open(input_file).unwrap()).lines() {
        let line = result.unwrap();
        let v: Vec<&str> = line.split_whitespace().collect();
        if v.is_empty() {
            continue;
        }
        match v[0] {
            "p" => {
                num_nodes = v[2].parse().unwrap();
            }
            "n" => {
                let node = v[1].parse::<usize>().unwrap() - 1;
                if v[2] == "s" {
                    source = node;
                } else {
                    sink = node;
                }
            }
            "a" => {
                let tail = v[1].parse::<usize>().unwrap() - 1;
                let head = v[2].parse::<usize>().unwrap() - 1;
                let capacity: i64 = v[3].parse().unwrap();
                arcs.push((tail, head, capacity));
            }
            _ => {}
        }
    }
    eprintln!("#nodes:{} #arcs:{}", num_nodes, arcs.len());

    let mut graph = ReverseArcGraph::new();
    graph.add_nodes(num_nodes);
    let arc_ids: Vec<_> = arcs.iter().map(|&(tail, head, _)| graph.add_arc(tail, head)).collect();

    let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, source, sink);
    for (&arc, &(_, _, capacity)) in arc_ids.iter().zip(&arcs) {
        solver.set_arc_capacity(arc, capacity);
    }

    let start = Instant::now();
    solver.solve();
    let end = start.elapsed();
    println!("{}.{:03}", end.as_secs(), end.subsec_nanos() / 1_000_000);

    match solver.status() {
        Status::Optimal => println!("{}", solver.optimal_flow()),
        Status::IntOverflow => println!("overflow, flow capped at {}", solver.optimal_flow()),
        Status::NotSolved => println!("not solved"),
    }
}
