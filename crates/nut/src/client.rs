use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Error type for UPS service queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NutError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("i/o error: {0}")]
    Io(String),
    /// `ERR <code>` reply from upsd (e.g. `UNKNOWN-UPS`, `ACCESS-DENIED`).
    #[error("server error: {0}")]
    Server(String),
    #[error("unexpected reply: {0}")]
    Protocol(String),
    #[error("request timed out")]
    Timeout,
}

/// Variable name -> value, as reported by `LIST VAR`.
pub type UpsVars = HashMap<String, String>;

/// Boxed future returned by [`UpsClient`] calls.
pub type NutFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, NutError>> + Send + 'a>>;

/// Query surface of a UPS management service.
///
/// Calls take `&mut self`: a client owns a single connection for the
/// lifetime of the daemon and requests on it are strictly sequential.
pub trait UpsClient: Send {
    /// Identifiers of every UPS the service knows about.
    fn list_ups(&mut self) -> NutFuture<'_, Vec<String>>;

    /// All variables currently reported for `name`.
    fn list_vars<'a>(&'a mut self, name: &'a str) -> NutFuture<'a, UpsVars>;
}

#[derive(Debug, Default)]
struct MockState {
    units: Vec<String>,
    vars: HashMap<String, UpsVars>,
    list_ups_failures: VecDeque<NutError>,
    list_vars_failures: VecDeque<NutError>,
    list_ups_calls: usize,
    list_vars_calls: usize,
}

/// Scripted client for testing.
///
/// Clones share state, so a test can keep a handle after moving the client
/// into the monitor and inspect call counts or change the reported values
/// between cycles.
#[derive(Debug, Clone, Default)]
pub struct MockUpsClient {
    state: Arc<Mutex<MockState>>,
}

impl MockUpsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a UPS with the variables `list_vars` will report for it.
    pub fn with_ups<I, K, V>(self, name: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        {
            let mut state = self.lock();
            if !state.units.iter().any(|u| u == name) {
                state.units.push(name.to_owned());
            }
            state.vars.insert(name.to_owned(), collect_vars(vars));
        }
        self
    }

    /// Replace the variables reported for an already registered UPS.
    pub fn set_vars<I, K, V>(&self, name: &str, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.lock().vars.insert(name.to_owned(), collect_vars(vars));
    }

    /// Queue an error for the next `list_ups` call.
    pub fn fail_next_list_ups(&self, err: NutError) {
        self.lock().list_ups_failures.push_back(err);
    }

    /// Queue an error for the next `list_vars` call.
    pub fn fail_next_list_vars(&self, err: NutError) {
        self.lock().list_vars_failures.push_back(err);
    }

    pub fn list_ups_calls(&self) -> usize {
        self.lock().list_ups_calls
    }

    pub fn list_vars_calls(&self) -> usize {
        self.lock().list_vars_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn collect_vars<I, K, V>(vars: I) -> UpsVars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl UpsClient for MockUpsClient {
    fn list_ups(&mut self) -> NutFuture<'_, Vec<String>> {
        let result = {
            let mut state = self.lock();
            state.list_ups_calls += 1;
            match state.list_ups_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(state.units.clone()),
            }
        };
        Box::pin(async move { result })
    }

    fn list_vars<'a>(&'a mut self, name: &'a str) -> NutFuture<'a, UpsVars> {
        let result = {
            let mut state = self.lock();
            state.list_vars_calls += 1;
            match state.list_vars_failures.pop_front() {
                Some(err) => Err(err),
                None => state
                    .vars
                    .get(name)
                    .cloned()
                    .ok_or_else(|| NutError::Server("UNKNOWN-UPS".into())),
            }
        };
        Box::pin(async move { result })
    }
}
