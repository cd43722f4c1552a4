//! DAG submission validation and degree computation (§4.2).

use std::collections::{HashMap, HashSet, VecDeque};

use connectra_core::defaults::MAX_NODES_PER_REQUEST;
use connectra_core::{DagNode, Edge, Error, Job, JobResponse, JobStatus, Result};
use chrono::Utc;
use uuid::Uuid;

/// A validated DAG submission: jobs ready for `bulk_upsert` (with `degree`
/// set to their computed in-degree) plus the edges to bulk-insert.
pub struct ValidatedDag {
    pub jobs: Vec<Job>,
    pub edges: Vec<Edge>,
}

/// Validate `nodes` via Kahn's algorithm and compute each node's in-degree
/// (§4.2). Fails with `Error::InvalidDag` on a cycle, a dangling edge
/// target, or too many nodes in one submission.
pub fn validate_dag(nodes: &[DagNode]) -> Result<ValidatedDag> {
    if nodes.len() > MAX_NODES_PER_REQUEST {
        return Err(Error::InvalidDag(format!(
            "submission has {} nodes, exceeds max {MAX_NODES_PER_REQUEST}",
            nodes.len()
        )));
    }

    let node_uuids: HashSet<Uuid> = nodes.iter().map(|n| n.uuid).collect();

    let mut in_degree: HashMap<Uuid, i32> = nodes.iter().map(|n| (n.uuid, 0)).collect();
    let mut outgoing: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for node in nodes {
        for &target in &node.edges {
            if !node_uuids.contains(&target) {
                return Err(Error::InvalidDag(format!(
                    "edge {} -> {target} references a node outside the submission",
                    node.uuid
                )));
            }
            *in_degree.entry(target).or_insert(0) += 1;
            outgoing.entry(node.uuid).or_default().push(target);
        }
    }

    let original_in_degree = in_degree.clone();
    let mut working_degree = in_degree;

    let mut queue: VecDeque<Uuid> = working_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&uuid, _)| uuid)
        .collect();

    let mut processed = 0usize;
    while let Some(uuid) = queue.pop_front() {
        processed += 1;
        if let Some(targets) = outgoing.get(&uuid) {
            for &target in targets {
                let degree = working_degree.get_mut(&target).expect("target tracked");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if processed != nodes.len() {
        return Err(Error::InvalidDag(
            "submission contains a cycle or unreachable node".to_string(),
        ));
    }

    let now = Utc::now();
    let jobs = nodes
        .iter()
        .map(|node| Job {
            uuid: node.uuid,
            job_title: node.job_title.clone(),
            job_type: node.job_type,
            data: node.data.clone(),
            status: JobStatus::Open,
            retry_count: node.retry_count,
            retry_interval: node.retry_interval,
            run_after: now,
            job_response: JobResponse::default(),
            degree: *original_in_degree.get(&node.uuid).unwrap_or(&0),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .collect();

    let edges = nodes
        .iter()
        .flat_map(|node| {
            node.edges
                .iter()
                .map(move |&target| Edge { source: node.uuid, target })
        })
        .collect();

    Ok(ValidatedDag { jobs, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectra_core::JobType;
    use serde_json::json;

    fn node(uuid: Uuid, edges: Vec<Uuid>) -> DagNode {
        DagNode {
            uuid,
            job_title: None,
            job_type: JobType::InsertCsvFile,
            data: json!({}),
            retry_count: 0,
            retry_interval: 60,
            edges,
        }
    }

    #[test]
    fn test_linear_chain_computes_degrees() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let nodes = vec![node(a, vec![b]), node(b, vec![c]), node(c, vec![])];
        let dag = validate_dag(&nodes).unwrap();
        let degree_of = |uuid: Uuid| dag.jobs.iter().find(|j| j.uuid == uuid).unwrap().degree;
        assert_eq!(degree_of(a), 0);
        assert_eq!(degree_of(b), 1);
        assert_eq!(degree_of(c), 1);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let nodes = vec![node(a, vec![b]), node(b, vec![a])];
        assert!(validate_dag(&nodes).is_err());
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let a = Uuid::new_v4();
        let dangling = Uuid::new_v4();
        let nodes = vec![node(a, vec![dangling])];
        assert!(validate_dag(&nodes).is_err());
    }

    #[test]
    fn test_too_many_nodes_is_rejected() {
        let nodes: Vec<DagNode> = (0..(MAX_NODES_PER_REQUEST + 1))
            .map(|_| node(Uuid::new_v4(), vec![]))
            .collect();
        assert!(validate_dag(&nodes).is_err());
    }

    #[test]
    fn test_diamond_shape_computes_degrees() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();
        let nodes = vec![
            node(a, vec![b, c]),
            node(b, vec![d]),
            node(c, vec![d]),
            node(d, vec![]),
        ];
        let dag = validate_dag(&nodes).unwrap();
        let degree_of = |uuid: Uuid| dag.jobs.iter().find(|j| j.uuid == uuid).unwrap().degree;
        assert_eq!(degree_of(d), 2);
    }
}
