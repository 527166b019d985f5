use std::collections::VecDeque;
use zsm_core::Session;

/// What the model should do after the sequencer has consumed an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillStep {
    Issue(String),
    Poll { names: Vec<String>, attempt: u32 },
    Finished { killed: usize },
}

/// Serializes kills one at a time, then polls until the killed sessions
/// disappear from the listing or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct KillSequencer {
    pending: VecDeque<String>,
    current: Option<String>,
    confirmed: Vec<String>,
    attempt: u32,
    max_attempts: u32,
}

impl KillSequencer {
    /// `None` when there is nothing to kill. Otherwise the sequencer and the
    /// first name to issue a kill for.
    pub fn start(targets: Vec<String>, max_attempts: u32) -> Option<(Self, String)> {
        let mut pending: VecDeque<String> = targets.into();
        let first = pending.pop_front()?;
        let sequencer = Self {
            pending,
            current: Some(first.clone()),
            confirmed: Vec::new(),
            attempt: 0,
            max_attempts: max_attempts.max(1),
        };
        Some((sequencer, first))
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[cfg(test)]
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    #[cfg(test)]
    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        self.current.is_none() && !self.confirmed.is_empty()
    }

    /// Records the outcome for the in-flight kill. A result for any other
    /// name is ignored and yields `None`.
    pub fn on_kill_result(&mut self, name: &str, succeeded: bool) -> Option<KillStep> {
        if self.current.as_deref() != Some(name) {
            return None;
        }
        self.current = None;
        if succeeded {
            self.confirmed.push(name.to_string());
        }
        if let Some(next) = self.pending.pop_front() {
            self.current = Some(next.clone());
            return Some(KillStep::Issue(next));
        }
        if self.confirmed.is_empty() {
            return Some(KillStep::Finished { killed: 0 });
        }
        self.attempt = 0;
        Some(KillStep::Poll {
            names: self.confirmed.clone(),
            attempt: self.attempt,
        })
    }

    /// One poll found a confirmed name still listed.
    pub fn on_still_alive(&mut self) -> KillStep {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return self.finish();
        }
        KillStep::Poll {
            names: self.confirmed.clone(),
            attempt: self.attempt,
        }
    }

    pub fn finish(&self) -> KillStep {
        KillStep::Finished {
            killed: self.confirmed.len(),
        }
    }
}

pub fn any_alive(names: &[String], sessions: &[Session]) -> bool {
    sessions
        .iter()
        .any(|session| names.iter().any(|name| *name == session.name))
}
