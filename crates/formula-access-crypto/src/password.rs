use std::fmt;

use zeroize::Zeroizing;

enum State<'a> {
    Pending(Box<dyn FnOnce() -> Option<String> + 'a>),
    Resolved(Option<Zeroizing<String>>),
}

/// Lazily supplied password.
///
/// Schemes that never need a password (legacy Jet, Office files with a blank encoding key) never
/// touch the source, so an interactive prompt behind [`PasswordSource::from_callback`] is only
/// shown when it matters. The callback runs at most once; later requests reuse its answer.
pub struct PasswordSource<'a> {
    state: State<'a>,
}

impl<'a> PasswordSource<'a> {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            state: State::Resolved(Some(Zeroizing::new(password.into()))),
        }
    }

    pub fn none() -> Self {
        Self {
            state: State::Resolved(None),
        }
    }

    pub fn from_callback<F>(callback: F) -> Self
    where
        F: FnOnce() -> Option<String> + 'a,
    {
        Self {
            state: State::Pending(Box::new(callback)),
        }
    }

    /// Resolve the password, invoking the callback on first use.
    pub(crate) fn get(&mut self) -> Option<&str> {
        if let State::Pending(_) = self.state {
            if let State::Pending(callback) =
                std::mem::replace(&mut self.state, State::Resolved(None))
            {
                self.state = State::Resolved(callback().map(Zeroizing::new));
            }
        }
        match &self.state {
            State::Resolved(password) => password.as_ref().map(|p| p.as_str()),
            State::Pending(_) => None,
        }
    }
}

impl Default for PasswordSource<'_> {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&str> for PasswordSource<'_> {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl From<Option<&str>> for PasswordSource<'_> {
    fn from(password: Option<&str>) -> Self {
        password.map_or_else(Self::none, Self::new)
    }
}

impl fmt::Debug for PasswordSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Resolved(Some(_)) => "resolved",
            State::Resolved(None) => "absent",
        };
        f.debug_struct("PasswordSource").field("state", &state).finish()
    }
}
