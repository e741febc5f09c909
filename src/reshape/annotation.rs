//! Member annotations.
//!
//! Annotations describe how each member of a result should be displayed
//! and coerced. They are looked up once per query through an
//! [`AnnotationProvider`] and then travel with the result.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{NormalizedQuery, TimeDimension};
use crate::time::{CustomGranularity, Granularity};

/// Value type of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    String,
    Number,
    Time,
    Boolean,
}

impl MemberType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "time" => Some(Self::Time),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Time => "time",
            Self::Boolean => "boolean",
        }
    }
}

/// Which section of the data model a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Measure,
    Dimension,
    Segment,
}

/// Members a drill-down query should select.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrillMembersGrouped {
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
}

/// Granularity details attached to a `member.granularity` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularityAnnotation {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

impl GranularityAnnotation {
    /// Annotation for a standard granularity (`Day` for `day`).
    pub fn standard(name: &str) -> Self {
        let mut chars = name.chars();
        let title = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            name: name.to_string(),
            title,
            interval: None,
            origin: None,
            offset: None,
        }
    }

    pub fn custom(name: &str, title: impl Into<String>, definition: &CustomGranularity) -> Self {
        Self {
            name: name.to_string(),
            title: title.into(),
            interval: Some(definition.interval.clone()),
            origin: definition.origin.clone(),
            offset: definition.offset.clone(),
        }
    }

    /// The interval definition, when this is a custom granularity.
    pub fn definition(&self) -> Option<CustomGranularity> {
        self.interval.as_ref().map(|interval| CustomGranularity {
            interval: interval.clone(),
            origin: self.origin.clone(),
            offset: self.offset.clone(),
        })
    }
}

/// Display metadata for one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub title: String,
    pub short_title: String,
    #[serde(rename = "type")]
    pub member_type: MemberType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drill_members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill_members_grouped: Option<DrillMembersGrouped>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<GranularityAnnotation>,
}

impl Annotation {
    pub fn new(
        title: impl Into<String>,
        short_title: impl Into<String>,
        member_type: MemberType,
    ) -> Self {
        Self {
            title: title.into(),
            short_title: short_title.into(),
            member_type,
            description: None,
            format: None,
            meta: None,
            drill_members: Vec::new(),
            drill_members_grouped: None,
            granularity: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_drill_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drill_members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_drill_members_grouped(mut self, grouped: DrillMembersGrouped) -> Self {
        self.drill_members_grouped = Some(grouped);
        self
    }

    pub fn with_granularity(mut self, granularity: GranularityAnnotation) -> Self {
        self.granularity = Some(granularity);
        self
    }
}

/// Annotations of one query, keyed by member.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryAnnotations {
    pub measures: IndexMap<String, Annotation>,
    pub dimensions: IndexMap<String, Annotation>,
    pub segments: IndexMap<String, Annotation>,
    pub time_dimensions: IndexMap<String, Annotation>,
}

impl QueryAnnotations {
    /// Look a member up in every section.
    pub fn get(&self, member: &str) -> Option<&Annotation> {
        self.measures
            .get(member)
            .or_else(|| self.dimensions.get(member))
            .or_else(|| self.time_dimensions.get(member))
            .or_else(|| self.segments.get(member))
    }

    /// Merge `other` into `self`, keeping existing entries.
    pub fn merge(&mut self, other: &QueryAnnotations) {
        fn merge_section(
            into: &mut IndexMap<String, Annotation>,
            from: &IndexMap<String, Annotation>,
        ) {
            for (key, annotation) in from {
                into.entry(key.clone()).or_insert_with(|| annotation.clone());
            }
        }
        merge_section(&mut self.measures, &other.measures);
        merge_section(&mut self.dimensions, &other.dimensions);
        merge_section(&mut self.segments, &other.segments);
        merge_section(&mut self.time_dimensions, &other.time_dimensions);
    }

    /// Custom granularity definition for a `member.granularity` key.
    pub fn custom_granularity(&self, member: &str) -> Option<CustomGranularity> {
        self.time_dimensions
            .get(member)
            .and_then(|a| a.granularity.as_ref())
            .and_then(GranularityAnnotation::definition)
    }
}

/// Source of member metadata.
pub trait AnnotationProvider: Send + Sync {
    /// Annotation of `member` (`cube.field`), if it exists and is visible.
    fn annotation(&self, member: &str, kind: MemberKind) -> Option<Annotation>;

    /// Custom granularity declared on a time dimension.
    fn custom_granularity(&self, _dimension: &str, _granularity: &str) -> Option<GranularityAnnotation> {
        None
    }
}

/// In-memory provider, keyed by member name.
#[derive(Debug, Clone, Default)]
pub struct StaticAnnotations {
    members: HashMap<String, (MemberKind, Annotation)>,
    granularities: HashMap<(String, String), GranularityAnnotation>,
}

impl StaticAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measure(mut self, member: impl Into<String>, annotation: Annotation) -> Self {
        self.members
            .insert(member.into(), (MemberKind::Measure, annotation));
        self
    }

    pub fn dimension(mut self, member: impl Into<String>, annotation: Annotation) -> Self {
        self.members
            .insert(member.into(), (MemberKind::Dimension, annotation));
        self
    }

    pub fn segment(mut self, member: impl Into<String>, annotation: Annotation) -> Self {
        self.members
            .insert(member.into(), (MemberKind::Segment, annotation));
        self
    }

    pub fn granularity(
        mut self,
        dimension: impl Into<String>,
        name: &str,
        title: impl Into<String>,
        definition: CustomGranularity,
    ) -> Self {
        self.granularities.insert(
            (dimension.into(), name.to_string()),
            GranularityAnnotation::custom(name, title, &definition),
        );
        self
    }
}

impl AnnotationProvider for StaticAnnotations {
    fn annotation(&self, member: &str, kind: MemberKind) -> Option<Annotation> {
        self.members
            .get(member)
            .filter(|(k, _)| *k == kind)
            .map(|(_, annotation)| annotation.clone())
    }

    fn custom_granularity(&self, dimension: &str, granularity: &str) -> Option<GranularityAnnotation> {
        self.granularities
            .get(&(dimension.to_string(), granularity.to_string()))
            .cloned()
    }
}

/// Collect the annotations a query's result needs.
///
/// Members the provider does not know are left out; the row transformation
/// rejects them if they show up in the data.
pub fn prepare_annotation<A: AnnotationProvider + ?Sized>(
    provider: &A,
    query: &NormalizedQuery,
) -> QueryAnnotations {
    let collect = |members: &[String], kind: MemberKind| -> IndexMap<String, Annotation> {
        members
            .iter()
            .filter_map(|m| provider.annotation(m, kind).map(|a| (m.clone(), a)))
            .collect()
    };

    let mut time_dimensions = IndexMap::new();
    for td in query.granular_time_dimensions() {
        let Some(base) = provider.annotation(&td.dimension, MemberKind::Dimension) else {
            continue;
        };
        if let Some(entry) = granular_annotation(provider, td, &base) {
            time_dimensions.insert(entry.0, entry.1);
        }
        if !query.dimensions.contains(&td.dimension) {
            time_dimensions.insert(td.dimension.clone(), base);
        }
    }

    QueryAnnotations {
        measures: collect(&query.measures, MemberKind::Measure),
        dimensions: collect(&query.dimensions, MemberKind::Dimension),
        segments: collect(&query.segments, MemberKind::Segment),
        time_dimensions,
    }
}

fn granular_annotation<A: AnnotationProvider + ?Sized>(
    provider: &A,
    td: &TimeDimension,
    base: &Annotation,
) -> Option<(String, Annotation)> {
    let granularity = td.granularity.as_ref()?;
    let member = td.member()?;
    let details = match granularity {
        Granularity::Standard(unit) => GranularityAnnotation::standard(unit.as_str()),
        Granularity::Custom(name) => provider
            .custom_granularity(&td.dimension, name)
            .unwrap_or_else(|| GranularityAnnotation {
                name: name.clone(),
                title: name.clone(),
                interval: None,
                origin: None,
                offset: None,
            }),
    };
    Some((member, base.clone().with_granularity(details)))
}
