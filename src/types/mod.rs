use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============= Task Tree Types =============

/// Arena index of a task inside its [`TaskTree`].
///
/// Ids are assigned in pre-order by the planner, so identical queries yield
/// identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl TaskId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Executor category of a task. `Composite` is the only non-leaf variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    Composite,
    Literature,
    Patent,
    Datasheet,
    SupplyChain,
    Component,
}

impl TaskCategory {
    /// Every category an executor can be registered for.
    pub const LEAVES: [TaskCategory; 5] = [
        TaskCategory::Literature,
        TaskCategory::Patent,
        TaskCategory::Datasheet,
        TaskCategory::SupplyChain,
        TaskCategory::Component,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Composite => "composite",
            TaskCategory::Literature => "literature",
            TaskCategory::Patent => "patent",
            TaskCategory::Datasheet => "datasheet",
            TaskCategory::SupplyChain => "supply-chain",
            TaskCategory::Component => "component",
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, TaskCategory::Composite)
    }

    /// Kind of entity the records of this category describe.
    pub fn entity_type(&self) -> EntityType {
        match self {
            TaskCategory::Literature => EntityType::Paper,
            TaskCategory::Patent => EntityType::Patent,
            TaskCategory::Composite => EntityType::Technology,
            TaskCategory::Datasheet | TaskCategory::SupplyChain | TaskCategory::Component => {
                EntityType::Component
            }
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "composite" => Ok(TaskCategory::Composite),
            "literature" => Ok(TaskCategory::Literature),
            "patent" => Ok(TaskCategory::Patent),
            "datasheet" => Ok(TaskCategory::Datasheet),
            "supply-chain" => Ok(TaskCategory::SupplyChain),
            "component" => Ok(TaskCategory::Component),
            other => Err(AppError::InvalidInput(format!(
                "unknown task category '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Why a task ended up `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceUnavailable,
    MalformedTask,
    Timeout,
    /// Composite node whose children all failed.
    ChildrenFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Number of executor attempts made before giving up.
    pub attempts: u32,
}

/// Independent research thread a subtree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchThread {
    TechnologyTrend,
    Standards,
    ComponentSearch,
    SupplyChain,
    AcademicResearch,
    PatentLandscape,
    CommercialProducts,
}

impl ResearchThread {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchThread::TechnologyTrend => "technology_trend",
            ResearchThread::Standards => "standards",
            ResearchThread::ComponentSearch => "component_search",
            ResearchThread::SupplyChain => "supply_chain",
            ResearchThread::AcademicResearch => "academic_research",
            ResearchThread::PatentLandscape => "patent_landscape",
            ResearchThread::CommercialProducts => "commercial_products",
        }
    }
}

/// Decomposition policy chosen once at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Broad technology/standards/components/supply-chain sweep.
    General,
    /// Evidence gathering organised by readiness band.
    Maturity,
}

// ============= Region Types =============

/// Market region a record's source is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "Asia")]
    Asia,
    #[serde(rename = "US")]
    Us,
    /// Not bound to a market (papers, patent offices, global catalogs).
    #[serde(rename = "Global")]
    Global,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Eu => "EU",
            Region::Asia => "Asia",
            Region::Us => "US",
            Region::Global => "Global",
        }
    }

    /// Certification marks a product needs to be sold in this region.
    pub fn compliance_marks(&self) -> &'static [&'static str] {
        match self {
            Region::Eu => &["CE", "RoHS", "REACH"],
            Region::Asia => &["CCC", "PSE", "KC"],
            Region::Us => &["FCC", "UL"],
            Region::Global => &[],
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eu" | "europe" | "emea" => Ok(Region::Eu),
            "asia" | "apac" => Ok(Region::Asia),
            "us" | "usa" | "na" | "americas" => Ok(Region::Us),
            "global" | "worldwide" => Ok(Region::Global),
            other => Err(AppError::InvalidInput(format!("unknown region '{}'", other))),
        }
    }
}

/// Allow-list of regions attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionFilter(BTreeSet<Region>);

impl RegionFilter {
    pub fn new(regions: impl IntoIterator<Item = Region>) -> Self {
        Self(regions.into_iter().collect())
    }

    /// `Global` records pass every filter; everything else must be listed.
    pub fn allows(&self, region: Region) -> bool {
        region == Region::Global || self.0.contains(&region)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for RegionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Region::as_str).collect();
        f.write_str(&names.join(","))
    }
}

// ============= Task & Tree =============

/// A node of the task tree. Owned by the orchestrator while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub parent_id: Option<TaskId>,
    pub query_fragment: String,
    pub category: TaskCategory,
    pub depth: usize,
    pub status: TaskStatus,
    /// Cache fingerprint for leaves, `merged:<id>` for composites. Set once
    /// the task produced a result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<ResearchThread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_filter: Option<RegionFilter>,
    pub children: Vec<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
}

impl Task {
    pub fn is_leaf(&self) -> bool {
        self.category.is_leaf()
    }
}

/// Arena of tasks; `tasks[0]` is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTree {
    pub query: String,
    /// Technology phrase the query is about, stop words removed.
    pub topic: String,
    pub strategy: Strategy,
    pub max_depth: usize,
    pub max_fanout: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_filter: Option<RegionFilter>,
    /// Application areas mentioned in the query (automotive, industrial, ...).
    pub applications: Vec<String>,
    pub tasks: Vec<Task>,
}

impl TaskTree {
    pub fn root(&self) -> TaskId {
        TaskId(0)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.index())
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_leaf())
    }

    /// Deepest task depth in the tree.
    pub fn depth(&self) -> usize {
        self.tasks.iter().map(|t| t.depth).max().unwrap_or(0)
    }

    /// Largest child count of any composite node.
    pub fn widest_fanout(&self) -> usize {
        self.tasks.iter().map(|t| t.children.len()).max().unwrap_or(0)
    }
}

// ============= Result Types =============

/// Kind of canonical subject an entity describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Component,
    Technology,
    Paper,
    Patent,
    Application,
    Manufacturer,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Component => "component",
            EntityType::Technology => "technology",
            EntityType::Paper => "paper",
            EntityType::Patent => "patent",
            EntityType::Application => "application",
            EntityType::Manufacturer => "manufacturer",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed hit produced by one executor invocation.
///
/// Records are never mutated; annotation produces a derived copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// `<task>/<natural key>`; referenced from classification evidence.
    pub record_id: String,
    /// Natural key of the entity this record describes.
    pub entity_id: String,
    pub entity_type: EntityType,
    pub source_category: TaskCategory,
    pub title: String,
    /// Category-specific structured fields.
    pub payload: BTreeMap<String, Value>,
    pub relevance_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trl: Option<u8>,
    pub provenance_task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<ResearchThread>,
    pub region: Region,
    /// Name of the source collaborator that supplied the raw candidate.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
}

impl ResultRecord {
    pub fn make_record_id(task: TaskId, entity_id: &str) -> String {
        format!("{}/{}", task, entity_id)
    }

    /// Copy annotated with a readiness level.
    pub fn with_trl(&self, trl: u8) -> Self {
        Self {
            trl: Some(trl.clamp(1, 9)),
            ..self.clone()
        }
    }

    /// Copy attributed to another task, used when a cached set is served.
    pub fn with_provenance(&self, task: TaskId, thread: Option<ResearchThread>) -> Self {
        Self {
            record_id: Self::make_record_id(task, &self.entity_id),
            provenance_task_id: task,
            thread,
            ..self.clone()
        }
    }

    /// Lower-cased title plus every textual payload value.
    pub fn text(&self) -> String {
        let mut text = self.title.to_lowercase();
        for value in self.payload.values() {
            collect_text(value, &mut text);
        }
        text
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push(' ');
            out.push_str(&s.to_lowercase());
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// A field value that lost a conflict, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNote {
    pub field: String,
    pub value: Value,
    pub relevance_score: f64,
    pub record_id: String,
}

/// Canonical, deduplicated subject identified by its natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub natural_key: String,
    pub entity_type: EntityType,
    pub fields: BTreeMap<String, Value>,
    /// Relevance of the record that supplied each field's current value.
    pub field_scores: BTreeMap<String, f64>,
    /// Record that supplied each field's current value.
    pub field_sources: BTreeMap<String, String>,
    /// Losing values of conflicting fields.
    pub secondary: Vec<ProvenanceNote>,
    pub relevance_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trl: Option<u8>,
    pub categories: BTreeSet<TaskCategory>,
    pub threads: BTreeSet<ResearchThread>,
    pub record_ids: BTreeSet<String>,
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
}

impl Entity {
    /// Empty entity, used for technology and application anchors.
    pub fn anchor(natural_key: String, entity_type: EntityType, title: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Value::String(title.to_string()));
        Self {
            natural_key,
            entity_type,
            fields,
            field_scores: BTreeMap::new(),
            field_sources: BTreeMap::new(),
            secondary: Vec::new(),
            relevance_score: 0.0,
            trl: None,
            categories: BTreeSet::new(),
            threads: BTreeSet::new(),
            record_ids: BTreeSet::new(),
            region: Region::Global,
            published: None,
        }
    }

    pub fn from_record(record: &ResultRecord) -> Self {
        let mut entity = Self::anchor(record.entity_id.clone(), record.entity_type, "");
        entity.fields.clear();
        entity.absorb(record);
        entity
    }

    pub fn title(&self) -> &str {
        self.fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(self.natural_key.as_str())
    }

    /// Fold a record into this entity.
    ///
    /// Conflicting fields keep the value from the higher-relevance record
    /// (ties go to the larger serialized value) and the loser is kept as a
    /// [`ProvenanceNote`]. The outcome does not depend on absorb order and
    /// re-absorbing the same record is a no-op.
    pub fn absorb(&mut self, record: &ResultRecord) {
        if !self.record_ids.insert(record.record_id.clone()) {
            return;
        }

        let title = (!record.title.is_empty())
            .then(|| ("title".to_string(), Value::String(record.title.clone())));
        let fields = record
            .payload
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(title);

        for (field, value) in fields {
            self.merge_field(field, value, record.relevance_score, &record.record_id);
        }

        self.relevance_score = self.relevance_score.max(record.relevance_score);
        self.trl = match (self.trl, record.trl) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.categories.insert(record.source_category);
        if let Some(thread) = record.thread {
            self.threads.insert(thread);
        }
        if self.region == Region::Global {
            self.region = record.region;
        }
        self.published = self.published.max(record.published);
        self.sort_secondary();
    }

    /// Merge another view of the same entity (e.g. the stored copy).
    pub fn absorb_entity(&mut self, other: &Entity) {
        for (field, value) in &other.fields {
            let score = other.field_scores.get(field).copied().unwrap_or(0.0);
            let source = other
                .field_sources
                .get(field)
                .cloned()
                .unwrap_or_default();
            self.merge_field(field.clone(), value.clone(), score, &source);
        }
        for note in &other.secondary {
            if !self.secondary.contains(note) {
                self.secondary.push(note.clone());
            }
        }
        self.record_ids.extend(other.record_ids.iter().cloned());
        self.categories.extend(other.categories.iter().copied());
        self.threads.extend(other.threads.iter().copied());
        self.relevance_score = self.relevance_score.max(other.relevance_score);
        self.trl = match (self.trl, other.trl) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.region == Region::Global {
            self.region = other.region;
        }
        self.published = self.published.max(other.published);
        self.sort_secondary();
    }

    fn merge_field(&mut self, field: String, value: Value, score: f64, record_id: &str) {
        let Some(current) = self.fields.get(&field) else {
            self.field_scores.insert(field.clone(), score);
            self.field_sources.insert(field.clone(), record_id.to_string());
            self.fields.insert(field, value);
            return;
        };

        if *current == value {
            let best = self.field_scores.entry(field).or_insert(score);
            *best = best.max(score);
            return;
        }

        let current_score = self.field_scores.get(&field).copied().unwrap_or(0.0);
        let incoming_wins = score > current_score
            || (score == current_score && value.to_string() > current.to_string());

        let loser = if incoming_wins {
            let old_source = self
                .field_sources
                .insert(field.clone(), record_id.to_string())
                .unwrap_or_default();
            self.field_scores.insert(field.clone(), score);
            let old_value = self
                .fields
                .insert(field.clone(), value)
                .unwrap_or(Value::Null);
            ProvenanceNote {
                field,
                value: old_value,
                relevance_score: current_score,
                record_id: old_source,
            }
        } else {
            ProvenanceNote {
                field,
                value,
                relevance_score: score,
                record_id: record_id.to_string(),
            }
        };

        if !self.secondary.contains(&loser) {
            self.secondary.push(loser);
        }
    }

    fn sort_secondary(&mut self) {
        self.secondary.sort_by(|a, b| {
            a.field
                .cmp(&b.field)
                .then_with(|| b.relevance_score.total_cmp(&a.relevance_score))
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
    }
}

/// Typed edge kinds of the relationship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Implements,
    SuitableFor,
    AlternativeTo,
    Cites,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Implements => "IMPLEMENTS",
            RelationshipType::SuitableFor => "SUITABLE_FOR",
            RelationshipType::AlternativeTo => "ALTERNATIVE_TO",
            RelationshipType::Cites => "CITES",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge between two stored entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipType,
    /// How many times this edge has been observed.
    pub occurrences: u32,
}

impl Relationship {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: RelationshipType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            occurrences: 1,
        }
    }
}

/// Readiness band used for reporting and classifier rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrlBand {
    /// TRL 1-2
    Theoretical,
    /// TRL 3-5
    Experimental,
    /// TRL 6-7
    Pilot,
    /// TRL 8-9
    Production,
}

impl TrlBand {
    pub const ALL: [TrlBand; 4] = [
        TrlBand::Theoretical,
        TrlBand::Experimental,
        TrlBand::Pilot,
        TrlBand::Production,
    ];

    pub fn of(trl: u8) -> Self {
        match trl {
            0..=2 => TrlBand::Theoretical,
            3..=5 => TrlBand::Experimental,
            6..=7 => TrlBand::Pilot,
            _ => TrlBand::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrlBand::Theoretical => "theoretical",
            TrlBand::Experimental => "experimental",
            TrlBand::Pilot => "pilot",
            TrlBand::Production => "production",
        }
    }
}

/// Current readiness judgement for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrlClassification {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub trl: u8,
    pub confidence: f64,
    /// Supporting record ids, strongest first.
    pub evidence: Vec<String>,
    pub justification: String,
    /// Bumped by the store every time the entity is reclassified.
    pub version: u32,
    pub classified_at: DateTime<Utc>,
}

/// Output of an executor or of a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<ResultRecord>,
    /// Filled by the aggregator.
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub classifications: Vec<TrlClassification>,
}

impl ResultSet {
    pub fn from_records(records: Vec<ResultRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.entities.is_empty()
    }
}

// ============= Final Result =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub task_id: TaskId,
    pub category: TaskCategory,
    pub query_fragment: String,
    pub failure: TaskFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStats {
    /// Ranked entities per report section.
    pub per_category: BTreeMap<TaskCategory, usize>,
    pub per_trl_band: BTreeMap<TrlBand, usize>,
    pub failures_per_category: BTreeMap<TaskCategory, usize>,
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub tasks_failed: usize,
    pub cache_hits: usize,
    pub duration_ms: u64,
}

/// Payload handed to the report renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub run_id: Uuid,
    pub query: String,
    pub strategy: Strategy,
    /// Set when any task failed or the root could not be aggregated.
    pub degraded: bool,
    /// Entities in rank order.
    pub ranked: Vec<Entity>,
    /// Natural keys per report section, in rank order.
    pub sections: BTreeMap<TaskCategory, Vec<String>>,
    pub relationships: Vec<Relationship>,
    pub classifications: Vec<TrlClassification>,
    pub failures: Vec<FailureReport>,
    pub stats: ResultStats,
}

// ============= API Request Types =============

/// Query API request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub query_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fanout: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_filter: Option<Vec<Region>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_seconds: Option<u64>,
}

impl ResearchRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Default::default()
        }
    }
}

// ============= Error Types =============

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::SourceUnavailable(_))
    }

    /// Failure kind recorded on a task that ended with this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AppError::SourceUnavailable(_) | AppError::StoreUnavailable(_) => {
                FailureKind::SourceUnavailable
            }
            AppError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::MalformedTask,
        }
    }
}

impl From<scout_vector::Error> for AppError {
    fn from(err: scout_vector::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::InvalidQuery(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::SourceUnavailable(_) | AppError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::MalformedTask(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(task: u32, key: &str, score: f64, payload: Value) -> ResultRecord {
        let payload = match payload {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        ResultRecord {
            record_id: ResultRecord::make_record_id(TaskId(task), key),
            entity_id: key.to_string(),
            entity_type: EntityType::Component,
            source_category: TaskCategory::Component,
            title: String::new(),
            payload,
            relevance_score: score,
            trl: None,
            provenance_task_id: TaskId(task),
            thread: None,
            region: Region::Eu,
            source: "test".to_string(),
            published: None,
        }
    }

    #[test]
    fn test_absorb_keeps_higher_relevance_value() {
        let high = record(1, "component:X1", 0.9, json!({"vin_max": "60V"}));
        let low = record(2, "component:X1", 0.4, json!({"vin_max": "48V"}));

        let mut entity = Entity::from_record(&low);
        entity.absorb(&high);

        assert_eq!(entity.fields["vin_max"], json!("60V"));
        assert_eq!(entity.secondary.len(), 1);
        assert_eq!(entity.secondary[0].value, json!("48V"));
        assert_eq!(entity.secondary[0].record_id, low.record_id);
    }

    #[test]
    fn test_absorb_is_order_independent() {
        let a = record(1, "component:X1", 0.9, json!({"pkg": "QFN"}));
        let b = record(2, "component:X1", 0.5, json!({"pkg": "SOIC"}));
        let c = record(3, "component:X1", 0.7, json!({"pkg": "TO-220"}));

        let mut forward = Entity::from_record(&a);
        forward.absorb(&b);
        forward.absorb(&c);

        let mut backward = Entity::from_record(&c);
        backward.absorb(&b);
        backward.absorb(&a);

        assert_eq!(forward.fields, backward.fields);
        assert_eq!(forward.secondary, backward.secondary);
    }

    #[test]
    fn test_absorb_same_record_twice_is_noop() {
        let a = record(1, "component:X1", 0.9, json!({"pkg": "QFN"}));
        let mut entity = Entity::from_record(&a);
        let before = entity.clone();
        entity.absorb(&a);
        assert_eq!(entity, before);
    }

    #[test]
    fn test_region_filter_allows_global() {
        let filter = RegionFilter::new([Region::Eu]);
        assert!(filter.allows(Region::Eu));
        assert!(filter.allows(Region::Global));
        assert!(!filter.allows(Region::Asia));
        assert_eq!(filter.to_string(), "EU");
    }

    #[test]
    fn test_region_aliases() {
        assert_eq!("Europe".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!("APAC".parse::<Region>().unwrap(), Region::Asia);
        assert!("mars".parse::<Region>().is_err());
    }

    #[test]
    fn test_trl_band_boundaries() {
        assert_eq!(TrlBand::of(2), TrlBand::Theoretical);
        assert_eq!(TrlBand::of(3), TrlBand::Experimental);
        assert_eq!(TrlBand::of(7), TrlBand::Pilot);
        assert_eq!(TrlBand::of(8), TrlBand::Production);
    }

    #[test]
    fn test_only_source_unavailable_is_transient() {
        assert!(AppError::SourceUnavailable("down".into()).is_transient());
        assert!(!AppError::MalformedTask("bad".into()).is_transient());
        assert!(!AppError::Timeout("slow".into()).is_transient());
    }

    #[test]
    fn test_research_request_uses_camel_case() {
        let req: ResearchRequest = serde_json::from_value(json!({
            "queryText": "GaN",
            "maxDepth": 1,
            "regionFilter": ["EU"]
        }))
        .unwrap();
        assert_eq!(req.max_depth, Some(1));
        assert_eq!(req.region_filter, Some(vec![Region::Eu]));
    }
}
