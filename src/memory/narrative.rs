//! Narrative arcs: long-running themes in a user's story.
//!
//! A theme detected in an interaction reuses the user's open arc with that
//! title or opens a new one. Chapter and completion are derived from the
//! arc's current contents, so completion can move both ways.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::record::GuidanceBundle;
use crate::phase::Element;
use crate::store::UserStore;
use crate::text;

/// Theme names and the keywords that signal them.
pub const THEMES: &[(&str, &[&str])] = &[
    ("transformation", &["change", "transform", "new", "different"]),
    ("relationship", &["love", "connection", "partner", "relationship"]),
    ("purpose", &["purpose", "meaning", "calling", "mission"]),
    ("healing", &["heal", "pain", "trauma", "recovery"]),
    ("growth", &["grow", "develop", "evolve", "expand"]),
    ("creation", &["create", "build", "manifest", "birth"]),
];

/// Arcs at or above this completion are closed.
pub const CLOSED_AT: f64 = 0.9;

const EXCERPT_CHARS: usize = 50;

/// Themes of `tokens`, in table order.
pub fn extract_themes(tokens: &[String]) -> Vec<String> {
    THEMES
        .iter()
        .filter(|(_, keywords)| text::contains_any(tokens, keywords))
        .map(|(theme, _)| theme.to_string())
        .collect()
}

/// Kind of tension an interaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensionKind {
    Conflict,
    Uncertainty,
    Desire,
    Fear,
    Exploration,
}

impl TensionKind {
    const TABLE: [(TensionKind, &'static [&'static str]); 4] = [
        (TensionKind::Conflict, &["but", "however", "struggle", "fight"]),
        (TensionKind::Uncertainty, &["confused", "don't know", "unsure", "lost"]),
        (TensionKind::Desire, &["want", "need", "wish", "hope"]),
        (TensionKind::Fear, &["afraid", "scared", "worry", "anxious"]),
    ];

    /// First matching kind; exploration when nothing matches.
    pub fn classify(tokens: &[String]) -> Self {
        Self::TABLE
            .iter()
            .find(|(_, keywords)| text::contains_any(tokens, keywords))
            .map(|(kind, _)| *kind)
            .unwrap_or(TensionKind::Exploration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tension {
    pub kind: TensionKind,
    pub excerpt: String,
    pub resolved: bool,
}

/// Chapter of an arc, derived from its event count and completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chapter {
    Beginning,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Beginning => "Beginning",
            Self::RisingAction => "Rising Action",
            Self::Climax => "Climax",
            Self::FallingAction => "Falling Action",
            Self::Resolution => "Resolution",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcEvent {
    pub at: u64,
    pub excerpt: String,
    pub archetype: Option<String>,
    pub element: Element,
}

/// Snapshot of what opened an arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcBeginning {
    pub at: u64,
    pub trigger: String,
    pub initial_guidance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeArc {
    pub arc_id: String,
    /// The theme name.
    pub title: String,
    pub beginning: ArcBeginning,
    pub current_chapter: Chapter,
    pub key_events: Vec<ArcEvent>,
    pub active_tensions: Vec<Tension>,
    pub oracle_guidance: Vec<GuidanceBundle>,
    pub completion: f64,
}

impl NarrativeArc {
    pub fn is_open(&self) -> bool {
        self.completion < CLOSED_AT
    }

    pub fn unresolved_tensions(&self) -> usize {
        self.active_tensions.iter().filter(|t| !t.resolved).count()
    }

    /// `(resolved ratio + min(guidance / 10, 1)) / 2`; no tensions counts as fully resolved.
    pub fn compute_completion(&self) -> f64 {
        let resolved_ratio = if self.active_tensions.is_empty() {
            1.0
        } else {
            let resolved = self.active_tensions.len() - self.unresolved_tensions();
            resolved as f64 / self.active_tensions.len() as f64
        };
        let guidance = (self.oracle_guidance.len() as f64 / 10.0).min(1.0);
        (resolved_ratio + guidance) / 2.0
    }

    pub fn compute_chapter(&self) -> Chapter {
        match self.key_events.len() {
            0..=2 => Chapter::Beginning,
            3..=5 => Chapter::RisingAction,
            6..=8 => Chapter::Climax,
            _ if self.completion > 0.8 => Chapter::Resolution,
            _ => Chapter::FallingAction,
        }
    }

    fn event(content: &str, guidance: &GuidanceBundle, at: u64) -> ArcEvent {
        ArcEvent {
            at,
            excerpt: text::excerpt(content, EXCERPT_CHARS),
            archetype: guidance.archetype.clone(),
            element: guidance.element,
        }
    }
}

/// Per-user narrative arcs, in creation order.
#[derive(Debug, Default)]
pub struct NarrativeArcTracker {
    arcs: UserStore<Vec<NarrativeArc>>,
}

impl NarrativeArcTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `content` to an arc per detected theme. Returns the ids of the
    /// arcs touched.
    pub fn record(
        &self,
        user_id: &str,
        content: &str,
        guidance: &GuidanceBundle,
        at: u64,
    ) -> Vec<String> {
        let tokens = text::tokenize(content);
        let themes = extract_themes(&tokens);
        if themes.is_empty() {
            return Vec::new();
        }
        self.arcs.with(user_id, Vec::new, |arcs| {
            themes
                .iter()
                .map(|theme| {
                    match arcs.iter_mut().find(|a| a.is_open() && a.title == *theme) {
                        Some(arc) => {
                            arc.key_events.push(NarrativeArc::event(content, guidance, at));
                            arc.oracle_guidance.push(guidance.clone());
                            arc.current_chapter = arc.compute_chapter();
                            arc.completion = arc.compute_completion();
                            arc.arc_id.clone()
                        }
                        None => {
                            let arc_id = unique_arc_id(arcs, user_id, theme, at);
                            let mut arc = NarrativeArc {
                                arc_id: arc_id.clone(),
                                title: theme.clone(),
                                beginning: ArcBeginning {
                                    at,
                                    trigger: text::excerpt(content, EXCERPT_CHARS),
                                    initial_guidance: guidance.message.clone(),
                                },
                                current_chapter: Chapter::Beginning,
                                key_events: vec![NarrativeArc::event(content, guidance, at)],
                                active_tensions: vec![Tension {
                                    kind: TensionKind::classify(&tokens),
                                    excerpt: text::excerpt(content, EXCERPT_CHARS),
                                    resolved: false,
                                }],
                                oracle_guidance: vec![guidance.clone()],
                                completion: 0.0,
                            };
                            arc.completion = arc.compute_completion();
                            tracing::debug!(user_id, arc_id = %arc.arc_id, "narrative arc opened");
                            arcs.push(arc);
                            arc_id
                        }
                    }
                })
                .collect()
        })
    }

    /// Mark tension `index` of `arc_id` resolved. `false` when nothing matched
    /// or the tension was already resolved.
    pub fn resolve_tension(&self, user_id: &str, arc_id: &str, index: usize) -> bool {
        self.arcs
            .with_existing(user_id, |arcs| {
                let Some(arc) = arcs.iter_mut().find(|a| a.arc_id == arc_id) else {
                    return false;
                };
                match arc.active_tensions.get_mut(index) {
                    Some(tension) if !tension.resolved => {
                        tension.resolved = true;
                        arc.completion = arc.compute_completion();
                        arc.current_chapter = arc.compute_chapter();
                        true
                    }
                    _ => false,
                }
            })
            .unwrap_or(false)
    }

    pub fn open_arcs(&self, user_id: &str) -> Vec<NarrativeArc> {
        self.arcs
            .with_existing(user_id, |arcs| arcs.iter().filter(|a| a.is_open()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn open_arc_count(&self, user_id: &str) -> usize {
        self.arcs
            .with_existing(user_id, |arcs| arcs.iter().filter(|a| a.is_open()).count())
            .unwrap_or(0)
    }

    pub fn arcs(&self, user_id: &str) -> Vec<NarrativeArc> {
        self.arcs.get(user_id).unwrap_or_default()
    }

    pub(crate) fn restore(&self, user_id: &str, arcs: Vec<NarrativeArc>) {
        self.arcs.insert(user_id, arcs);
    }
}

fn unique_arc_id(arcs: &[NarrativeArc], user_id: &str, theme: &str, at: u64) -> String {
    let base = format!("{user_id}_{theme}_{}", at.saturating_mul(1000));
    if !arcs.iter().any(|a| a.arc_id == base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|id| !arcs.iter().any(|a| a.arc_id == *id))
        .unwrap_or(base)
}
