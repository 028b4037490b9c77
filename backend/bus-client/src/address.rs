//! Bus address parsing.
//!
//! An address is a `;`-separated list of transport candidates, each of the
//! form `transport:key=value,key=value`. Candidates keep their input order:
//! later ones are fallbacks, only tried when earlier ones fail.
//!
//! Characters are taken literally. No `%XX` unescaping is performed.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FormatResult};

use log::trace;

const NAME_TERMINATOR: char = ':';
const KEY_TERMINATOR: char = '=';
const PAIR_SEPARATOR: char = ',';
const CANDIDATE_SEPARATOR: char = ';';

/// One transport candidate parsed out of an address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSpec {
    name: String,
    options: BTreeMap<String, String>,
}

impl TransportSpec {
    pub fn new(name: impl Into<String>, options: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    /// Transport name, e.g. `unix`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Look up an option, treating an empty value as absent.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl Display for TransportSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}{NAME_TERMINATOR}", self.name)?;
        for (index, (key, value)) in self.options.iter().enumerate() {
            if index > 0 {
                write!(formatter, "{PAIR_SEPARATOR}")?;
            }
            write!(formatter, "{key}{KEY_TERMINATOR}{value}")?;
        }
        Ok(())
    }
}

/// Scanner states. Each delimiter moves the scan to exactly one other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseState {
    ReadingTransportName,
    ReadingKey,
    ReadingValue,
}

/// Accumulates the candidate currently being scanned.
#[derive(Debug, Default)]
pub(crate) struct PendingSpec {
    name: String,
    key: String,
    value: String,
    options: BTreeMap<String, String>,
}

impl PendingSpec {
    /// Commit the pending key/value pair. Later duplicates overwrite earlier ones.
    fn commit_pair(&mut self) {
        let key = std::mem::take(&mut self.key);
        let value = std::mem::take(&mut self.value);
        if !key.is_empty() {
            self.options.insert(key, value);
        }
    }

    fn take_spec(&mut self) -> Option<TransportSpec> {
        self.commit_pair();
        let pending = std::mem::take(self);
        if pending.name.is_empty() {
            return None;
        }
        Some(TransportSpec::new(pending.name, pending.options))
    }
}

/// Transition table: the next state for `c`, committing into `pending` and
/// `specs` as delimiters demand.
pub(crate) fn transition(
    state: ParseState,
    c: char,
    pending: &mut PendingSpec,
    specs: &mut Vec<TransportSpec>,
) -> ParseState {
    match (state, c) {
        (ParseState::ReadingTransportName, NAME_TERMINATOR) => ParseState::ReadingKey,
        (ParseState::ReadingKey, KEY_TERMINATOR) => ParseState::ReadingValue,
        (ParseState::ReadingValue, PAIR_SEPARATOR) => {
            pending.commit_pair();
            ParseState::ReadingKey
        }
        (ParseState::ReadingValue, CANDIDATE_SEPARATOR) => {
            if let Some(spec) = pending.take_spec() {
                specs.push(spec);
            }
            ParseState::ReadingTransportName
        }
        (ParseState::ReadingTransportName, _) => {
            pending.name.push(c);
            state
        }
        (ParseState::ReadingKey, _) => {
            pending.key.push(c);
            state
        }
        (ParseState::ReadingValue, _) => {
            pending.value.push(c);
            state
        }
    }
}

/// Parse an address string into its ordered transport candidates.
///
/// Parsing never fails. An address without any `transport:` prefix yields an
/// empty list, which callers must treat as its own failure mode.
///
/// # Examples
///
/// ```
/// use bus_client::address::parse_address;
///
/// let specs = parse_address("unix:path=/a;unix:path=/b");
/// assert_eq!(specs.len(), 2);
/// assert_eq!(specs[0].option("path"), Some("/a"));
/// ```
pub fn parse_address(address: &str) -> Vec<TransportSpec> {
    let mut state = ParseState::ReadingTransportName;
    let mut pending = PendingSpec::default();
    let mut specs = Vec::new();

    for c in address.chars() {
        state = transition(state, c, &mut pending, &mut specs);
    }

    // The final candidate has no trailing ';'. A name that never saw its ':'
    // is not a candidate.
    if state != ParseState::ReadingTransportName {
        if let Some(spec) = pending.take_spec() {
            specs.push(spec);
        }
    }

    trace!("Parsed {} transport candidate(s) from address", specs.len());
    specs
}

/// Serialize candidates back into address form.
pub fn format_address(specs: &[TransportSpec]) -> String {
    specs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&CANDIDATE_SEPARATOR.to_string())
}
