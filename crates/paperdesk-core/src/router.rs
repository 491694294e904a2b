//! Path → view mapping.

/// A top-level view of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    History,
    Paper { paper_id: String },
}

/// Declarative route table entry. `:name` segments bind a parameter.
#[derive(Debug, Clone, Copy)]
pub struct RouteDef {
    pub name: &'static str,
    pub pattern: &'static str,
}

pub const ROUTES: &[RouteDef] = &[
    RouteDef {
        name: "Home",
        pattern: "/",
    },
    RouteDef {
        name: "History",
        pattern: "/history",
    },
    RouteDef {
        name: "Paper",
        pattern: "/paper/:paperId",
    },
];

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::History => "History",
            Route::Paper { .. } => "Paper",
        }
    }

    /// The canonical path for this view.
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::History => "/history".to_string(),
            Route::Paper { paper_id } => format!("/paper/{}", urlencoding::encode(paper_id)),
        }
    }
}

/// Resolve a URL path (query string and fragment ignored) to its view.
pub fn resolve(path: &str) -> Option<Route> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for def in ROUTES {
        if let Some(param) = match_pattern(def.pattern, &segments) {
            return match def.name {
                "Home" => Some(Route::Home),
                "History" => Some(Route::History),
                "Paper" => Some(Route::Paper { paper_id: param? }),
                _ => None,
            };
        }
    }
    None
}

/// Match `segments` against `pattern`. Returns `Some(param)` on a match, where
/// `param` is the decoded value of the pattern's parameter, if it has one.
fn match_pattern(pattern: &str, segments: &[&str]) -> Option<Option<String>> {
    let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut param = None;
    for (part, seg) in parts.iter().zip(segments) {
        if part.starts_with(':') {
            param = Some(urlencoding::decode(seg).ok()?.into_owned());
        } else if part != seg {
            return None;
        }
    }
    Some(param)
}
