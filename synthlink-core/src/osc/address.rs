//! Address pattern tokenizing and the static routing table.
//!
//! An inbound address is split on `/` (dropping the empty leading segment)
//! and matched against [`ROUTES`] by token prefix. Tokens past the matched
//! prefix are ignored, except for `param`, whose remainder names the
//! parameter.

use synthlink_types::{PatchNav, TuningKind};

/// A tokenized inbound address. Borrowed from the message for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPath<'a> {
    raw: &'a str,
    tokens: Vec<&'a str>,
}

impl<'a> AddressPath<'a> {
    /// `None` unless the address starts with `/`.
    pub fn parse(addr: &'a str) -> Option<Self> {
        let body = addr.strip_prefix('/')?;
        Some(Self {
            raw: body,
            tokens: body.split('/').collect(),
        })
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    /// Everything after the first `n` tokens, separators included.
    /// `remainder(1)` of `/param/a/filter1/cutoff` is `a/filter1/cutoff`.
    pub fn remainder(&self, n: usize) -> &'a str {
        if n == 0 {
            return self.raw;
        }
        let mut rest = self.raw;
        for _ in 0..n {
            match rest.split_once('/') {
                Some((_, tail)) => rest = tail,
                None => return "",
            }
        }
        rest
    }
}

/// What an address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Real-time parameter update; name is the remainder after `param`
    Param,
    PatchLoad,
    PatchSave,
    PatchNav(PatchNav),
    /// Update the persisted default directory for tuning files
    TuningPath(TuningKind),
    /// Load a tuning or mapping file
    TuningFile(TuningKind),
    SendAllParameters,
}

/// Token prefix → route. First match wins.
pub const ROUTES: &[(&[&str], Route)] = &[
    (&["param"], Route::Param),
    (&["patch", "load"], Route::PatchLoad),
    (&["patch", "save"], Route::PatchSave),
    (&["patch", "random"], Route::PatchNav(PatchNav::Random)),
    (&["patch", "incr"], Route::PatchNav(PatchNav::Next)),
    (&["patch", "decr"], Route::PatchNav(PatchNav::Previous)),
    (&["patch", "incr_category"], Route::PatchNav(PatchNav::NextCategory)),
    (&["patch", "decr_category"], Route::PatchNav(PatchNav::PreviousCategory)),
    (&["tuning", "path", "scl"], Route::TuningPath(TuningKind::Scale)),
    (&["tuning", "path", "kbm"], Route::TuningPath(TuningKind::Mapping)),
    (&["tuning", "scl"], Route::TuningFile(TuningKind::Scale)),
    (&["tuning", "kbm"], Route::TuningFile(TuningKind::Mapping)),
    (&["send_all_parameters"], Route::SendAllParameters),
];

/// Match a tokenized address against the routing table.
pub fn resolve(path: &AddressPath<'_>) -> Option<Route> {
    let tokens = path.tokens();
    ROUTES
        .iter()
        .find(|(pattern, _)| tokens.len() >= pattern.len() && tokens[..pattern.len()] == **pattern)
        .map(|(_, route)| *route)
}
