//! Contractor tree of a single project, built from its flat
//! `project_contractors` edge list.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::models::ContractorAssignment;
use crate::roles::StaffRole;

/// Classification of the root contractor, which governs how the rest of the
/// tree may be staffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MainContractorKind {
    SubContractor,
    Contractor,
    Other(String),
}

impl MainContractorKind {
    pub fn from_type_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "sub-contractor" | "subcontractor" => MainContractorKind::SubContractor,
            "contractor" => MainContractorKind::Contractor,
            _ => MainContractorKind::Other(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MainContractorKind::SubContractor => "Sub-contractor",
            MainContractorKind::Contractor => "Contractor",
            MainContractorKind::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub assignment: ContractorAssignment,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct ContractorTree {
    project_id: i64,
    nodes: Vec<TreeNode>,
    root: usize,
    by_assignment: HashMap<i64, usize>,
}

/// Serialisable nested view of the tree.
#[derive(Debug, Serialize)]
pub struct HierarchyView {
    pub project_id: i64,
    pub main_contractor_kind: String,
    pub root: NodeView,
}

#[derive(Debug, Serialize)]
pub struct NodeView {
    pub assignment_id: i64,
    pub contractor_id: i64,
    pub contractor_name: String,
    pub contractor_type: String,
    pub children: Vec<NodeView>,
}

impl ContractorTree {
    #[instrument(skip(edges), fields(edge_count = edges.len()))]
    pub fn build(project_id: i64, edges: Vec<ContractorAssignment>) -> Result<Self, AppError> {
        let mut by_assignment = HashMap::with_capacity(edges.len());
        let mut roots = Vec::new();

        for (index, edge) in edges.iter().enumerate() {
            if edge.project_id != project_id {
                return Err(AppError::MalformedHierarchy(format!(
                    "assignment {} belongs to project {}, not {}",
                    edge.id, edge.project_id, project_id
                )));
            }
            if by_assignment.insert(edge.id, index).is_some() {
                return Err(AppError::MalformedHierarchy(format!(
                    "assignment {} appears more than once",
                    edge.id
                )));
            }
            if edge.parent_assignment_id.is_none() {
                roots.push(index);
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(AppError::MalformedHierarchy(format!(
                    "project {} has no main contractor",
                    project_id
                )));
            }
            _ => {
                return Err(AppError::MalformedHierarchy(format!(
                    "project {} has {} main contractors",
                    project_id,
                    roots.len()
                )));
            }
        };

        let mut nodes: Vec<TreeNode> = edges
            .into_iter()
            .map(|assignment| TreeNode {
                assignment,
                parent: None,
                children: Vec::new(),
                depth: 0,
            })
            .collect();

        for index in 0..nodes.len() {
            let Some(parent_id) = nodes[index].assignment.parent_assignment_id else {
                continue;
            };
            let parent = *by_assignment.get(&parent_id).ok_or_else(|| {
                AppError::MalformedHierarchy(format!(
                    "assignment {} references missing parent {}",
                    nodes[index].assignment.id, parent_id
                ))
            })?;
            nodes[index].parent = Some(parent);
            nodes[parent].children.push(index);
        }

        // Every node must hang off the root; anything else sits in a cycle.
        let mut visited = HashSet::with_capacity(nodes.len());
        let mut stack = vec![(root, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }
            nodes[index].depth = depth;
            for child in &nodes[index].children {
                stack.push((*child, depth + 1));
            }
        }

        if visited.len() != nodes.len() {
            return Err(AppError::MalformedHierarchy(format!(
                "{} assignments in project {} are unreachable from the main contractor",
                nodes.len() - visited.len(),
                project_id
            )));
        }

        debug!(node_count = nodes.len(), "Built contractor tree");

        Ok(Self {
            project_id,
            nodes,
            root,
            by_assignment,
        })
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &ContractorAssignment {
        &self.nodes[self.root].assignment
    }

    pub fn node(&self, assignment_id: i64) -> Option<&TreeNode> {
        self.by_assignment
            .get(&assignment_id)
            .map(|index| &self.nodes[*index])
    }

    pub fn parent_of(&self, assignment_id: i64) -> Option<&ContractorAssignment> {
        self.node(assignment_id)
            .and_then(|node| node.parent)
            .map(|index| &self.nodes[index].assignment)
    }

    pub fn children_of(&self, assignment_id: i64) -> Vec<&ContractorAssignment> {
        self.node(assignment_id)
            .map(|node| {
                node.children
                    .iter()
                    .map(|index| &self.nodes[*index].assignment)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    /// Edge of the project whose contractor is `contractor_id`. The root wins
    /// when a contractor appears more than once.
    pub fn find_by_contractor(&self, contractor_id: i64) -> Option<&ContractorAssignment> {
        self.nodes
            .iter()
            .filter(|node| node.assignment.contractor_id == contractor_id)
            .min_by_key(|node| node.depth)
            .map(|node| &node.assignment)
    }

    pub fn main_contractor_kind(&self) -> MainContractorKind {
        MainContractorKind::from_type_name(&self.root().contractor_type)
    }

    /// Contractor ids a Contractor or Sub-contractor person may be assigned to.
    pub fn assignable_companies(&self, role: StaffRole) -> Vec<i64> {
        if !role.is_company_bound() {
            return Vec::new();
        }

        let root = &self.nodes[self.root];
        let candidates: Vec<usize> = match self.main_contractor_kind() {
            MainContractorKind::SubContractor => Vec::new(),
            MainContractorKind::Contractor => root.children.clone(),
            MainContractorKind::Other(_) => root
                .children
                .iter()
                .flat_map(|child| {
                    std::iter::once(*child).chain(self.nodes[*child].children.iter().copied())
                })
                .collect(),
        };

        let root_contractor = root.assignment.contractor_id;
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .map(|index| self.nodes[index].assignment.contractor_id)
            .filter(|contractor_id| *contractor_id != root_contractor)
            .filter(|contractor_id| seen.insert(*contractor_id))
            .collect()
    }

    /// The assignable companies as full edges, for rendering choices.
    pub fn assignable_company_nodes(&self, role: StaffRole) -> Vec<&ContractorAssignment> {
        self.assignable_companies(role)
            .into_iter()
            .filter_map(|contractor_id| self.find_by_contractor(contractor_id))
            .collect()
    }

    pub fn view(&self) -> HierarchyView {
        HierarchyView {
            project_id: self.project_id,
            main_contractor_kind: self.main_contractor_kind().as_str().to_string(),
            root: self.node_view(self.root),
        }
    }

    fn node_view(&self, index: usize) -> NodeView {
        let node = &self.nodes[index];
        NodeView {
            assignment_id: node.assignment.id,
            contractor_id: node.assignment.contractor_id,
            contractor_name: node.assignment.contractor_name.clone(),
            contractor_type: node.assignment.contractor_type.clone(),
            children: node
                .children
                .iter()
                .map(|child| self.node_view(*child))
                .collect(),
        }
    }
}
