//! Typed view of an EXPLAIN plan tree
//!
//! Only the keys the detection rules read get their own fields; everything
//! else EXPLAIN reports is kept in [`PlanNode::extra`]. The tree is built once
//! per analysis call and only read afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One EXPLAIN document: the plan tree plus the timings reported next to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPlan {
    pub root: PlanNode,
    pub planning_time_ms: Option<f64>,
    /// Only present with EXPLAIN ANALYZE
    pub execution_time_ms: Option<f64>,
}

impl QueryPlan {
    pub fn new(root: PlanNode) -> Self {
        Self {
            root,
            planning_time_ms: None,
            execution_time_ms: None,
        }
    }

    pub fn with_planning_time(mut self, ms: f64) -> Self {
        self.planning_time_ms = Some(ms);
        self
    }

    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    /// The root's total cost, which includes every other node; 0 when absent
    pub fn total_cost(&self) -> f64 {
        self.root.total_cost.unwrap_or(0.0)
    }

    /// Depth-first, parents before children
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        self.root.iter()
    }

    pub fn has_sequential_scans(&self) -> bool {
        self.iter_nodes().any(|n| n.node_type == NodeType::SeqScan)
    }
}

/// A plan node and its subtree.
///
/// Costs are in planner units and inclusive of the children. Row counts are
/// per loop, as EXPLAIN reports them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanNode {
    pub node_type: NodeType,
    pub relation_name: Option<String>,
    pub alias: Option<String>,
    /// Reported with VERBOSE only
    pub schema: Option<String>,
    /// "Outer", "Inner", "SubPlan", ...
    pub parent_relationship: Option<String>,
    pub startup_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub plan_rows: Option<u64>,
    pub plan_width: Option<u32>,
    pub actual_rows: Option<u64>,
    pub actual_loops: Option<u64>,
    /// Filter text as printed by EXPLAIN, casts included
    pub filter: Option<String>,
    pub rows_removed_by_filter: Option<u64>,
    pub index_name: Option<String>,
    pub index_cond: Option<String>,
    pub join_type: Option<JoinType>,
    pub join_filter: Option<String>,
    pub hash_cond: Option<String>,
    pub merge_cond: Option<String>,
    pub sort_key: Vec<String>,
    /// e.g. "quicksort", "top-N heapsort", "external merge"
    pub sort_method: Option<String>,
    pub children: Vec<PlanNode>,
    /// Keys without a dedicated field, verbatim
    pub extra: HashMap<String, serde_json::Value>,
}

impl PlanNode {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            relation_name: None,
            alias: None,
            schema: None,
            parent_relationship: None,
            startup_cost: None,
            total_cost: None,
            plan_rows: None,
            plan_width: None,
            actual_rows: None,
            actual_loops: None,
            filter: None,
            rows_removed_by_filter: None,
            index_name: None,
            index_cond: None,
            join_type: None,
            join_filter: None,
            hash_cond: None,
            merge_cond: None,
            sort_key: Vec::new(),
            sort_method: None,
            children: Vec::new(),
            extra: HashMap::new(),
        }
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_cost(mut self, startup: f64, total: f64) -> Self {
        self.startup_cost = Some(startup);
        self.total_cost = Some(total);
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.plan_rows = Some(rows);
        self
    }

    pub fn with_actual_rows(mut self, rows: u64) -> Self {
        self.actual_rows = Some(rows);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_sort_key<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.sort_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.parent_relationship = Some(relationship.into());
        self
    }

    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Iterates this subtree, self first
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Actual rows when EXPLAIN ANALYZE ran, otherwise the planner's estimate
    pub fn effective_rows(&self) -> Option<u64> {
        self.actual_rows.or(self.plan_rows)
    }

    /// The join condition, whichever of Join Filter, Hash Cond or Merge Cond is present
    pub fn join_condition(&self) -> Option<&str> {
        self.hash_cond
            .as_deref()
            .or(self.merge_cond.as_deref())
            .or(self.join_filter.as_deref())
    }

    /// Table name usable in DDL, schema-qualified unless the schema is `public`
    pub fn qualified_relation(&self) -> Option<String> {
        let relation = self.relation_name.as_ref()?;
        match self.schema.as_deref() {
            Some(schema) if schema != "public" => Some(format!("{}.{}", schema, relation)),
            _ => Some(relation.clone()),
        }
    }

    /// The first node in this subtree (self included) that reads a base relation
    pub fn find_base_relation(&self) -> Option<&PlanNode> {
        self.iter().find(|n| n.relation_name.is_some())
    }

    /// Some node in this subtree reads through an index
    pub fn uses_index_scan(&self) -> bool {
        self.iter().any(|n| n.node_type.is_index_scan())
    }

    /// The inner side of a join: the child marked "Inner", else the second child
    pub fn inner_child(&self) -> Option<&PlanNode> {
        self.children
            .iter()
            .find(|c| c.parent_relationship.as_deref() == Some("Inner"))
            .or_else(|| self.children.get(1))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    RightSemi,
    RightAnti,
}

impl JoinType {
    /// Parses the `Join Type` value; unknown spellings give `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inner" => Some(Self::Inner),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "full" => Some(Self::Full),
            "semi" => Some(Self::Semi),
            "anti" => Some(Self::Anti),
            "right semi" => Some(Self::RightSemi),
            "right anti" => Some(Self::RightAnti),
            _ => None,
        }
    }
}

macro_rules! node_types {
    ($($variant:ident => $name:literal,)*) => {
        /// The operation of a plan node.
        ///
        /// Serializes as the spelling EXPLAIN uses (`"Seq Scan"`), so
        /// downstream consumers see the strings PostgreSQL produced.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", from = "String")]
        pub enum NodeType {
            $($variant,)*
            /// Any other node type, keeping its spelling
            Other(String),
        }

        impl NodeType {
            pub fn from_postgres_str(s: &str) -> Self {
                match s {
                    $($name => Self::$variant,)*
                    other => Self::Other(other.to_string()),
                }
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Other(name) => name,
                }
            }
        }
    };
}

node_types! {
    SeqScan => "Seq Scan",
    IndexScan => "Index Scan",
    IndexOnlyScan => "Index Only Scan",
    BitmapIndexScan => "Bitmap Index Scan",
    BitmapHeapScan => "Bitmap Heap Scan",
    SubqueryScan => "Subquery Scan",
    FunctionScan => "Function Scan",
    CteScan => "CTE Scan",
    NestedLoop => "Nested Loop",
    HashJoin => "Hash Join",
    MergeJoin => "Merge Join",
    Hash => "Hash",
    Aggregate => "Aggregate",
    Sort => "Sort",
    IncrementalSort => "Incremental Sort",
    Limit => "Limit",
    Materialize => "Materialize",
    Memoize => "Memoize",
    Result => "Result",
    Gather => "Gather",
    GatherMerge => "Gather Merge",
}

impl NodeType {
    /// Parallel-query collectors, whose cost repeats their workers' cost
    pub fn is_gather(&self) -> bool {
        matches!(self, Self::Gather | Self::GatherMerge)
    }

    pub fn is_join(&self) -> bool {
        matches!(self, Self::NestedLoop | Self::HashJoin | Self::MergeJoin)
    }

    /// Bitmap heap scans count: they are always fed by a bitmap index scan
    pub fn is_index_scan(&self) -> bool {
        matches!(
            self,
            Self::IndexScan | Self::IndexOnlyScan | Self::BitmapIndexScan | Self::BitmapHeapScan
        )
    }

    pub fn is_sort(&self) -> bool {
        matches!(self, Self::Sort | Self::IncrementalSort)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        node_type.as_str().to_string()
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        NodeType::from_postgres_str(&s)
    }
}

/// Depth-first walk over a plan subtree
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reversed so the first child is popped next
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
