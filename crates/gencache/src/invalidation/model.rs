//! Metamodel references and object snapshots
//!
//! Every reference renders as a canonical path that doubles as its
//! dependency name in the generation store, e.g. `p/sales/d/orders/dim/region`.

use std::fmt;

/// Suffix of a domain's hierarchy marker dependency
pub const HIERARCHY_SUFFIX: &str = "#hierarchy";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectPk {
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainPk {
    pub project: ProjectPk,
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionPk {
    pub domain: DomainPk,
    pub dimension_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePk {
    pub dimension: DimensionPk,
    pub attribute_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricPk {
    pub domain: DomainPk,
    pub metric_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationPk {
    pub project: ProjectPk,
    pub relation_id: String,
}

impl ProjectPk {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    #[must_use]
    pub fn domain(&self, domain_id: impl Into<String>) -> DomainPk {
        DomainPk {
            project: self.clone(),
            domain_id: domain_id.into(),
        }
    }

    #[must_use]
    pub fn relation(&self, relation_id: impl Into<String>) -> RelationPk {
        RelationPk {
            project: self.clone(),
            relation_id: relation_id.into(),
        }
    }
}

impl DomainPk {
    #[must_use]
    pub fn dimension(&self, dimension_id: impl Into<String>) -> DimensionPk {
        DimensionPk {
            domain: self.clone(),
            dimension_id: dimension_id.into(),
        }
    }

    #[must_use]
    pub fn metric(&self, metric_id: impl Into<String>) -> MetricPk {
        MetricPk {
            domain: self.clone(),
            metric_id: metric_id.into(),
        }
    }

    /// Synthetic dependency covering the domain's dimension hierarchy
    #[must_use]
    pub fn hierarchy_marker(&self) -> String {
        format!("{self}{HIERARCHY_SUFFIX}")
    }
}

impl DimensionPk {
    #[must_use]
    pub fn attribute(&self, attribute_id: impl Into<String>) -> AttributePk {
        AttributePk {
            dimension: self.clone(),
            attribute_id: attribute_id.into(),
        }
    }
}

impl fmt::Display for ProjectPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p/{}", self.project_id)
    }
}

impl fmt::Display for DomainPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/d/{}", self.project, self.domain_id)
    }
}

impl fmt::Display for DimensionPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/dim/{}", self.domain, self.dimension_id)
    }
}

impl fmt::Display for AttributePk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/a/{}", self.dimension, self.attribute_id)
    }
}

impl fmt::Display for MetricPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/m/{}", self.domain, self.metric_id)
    }
}

impl fmt::Display for RelationPk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/r/{}", self.project, self.relation_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub pk: ProjectPk,
    /// Identity of the physical database backing the project
    pub database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub pk: DomainPk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub pk: DimensionPk,
    pub parent: Option<DimensionPk>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub pk: AttributePk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub pk: MetricPk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub pk: RelationPk,
    pub left: DomainPk,
    pub right: DomainPk,
}

/// Snapshot of a metamodel object carried in a mutation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetamodelObject {
    Project(Project),
    Domain(Domain),
    Dimension(Dimension),
    Attribute(Attribute),
    Metric(Metric),
    Relation(Relation),
}
