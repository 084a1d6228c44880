use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of query engine profiling metrics.
///
/// Profiling is enabled via the `BIOFILTER_PROFILE` environment variable and
/// tracks time spent in each phase of plan handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent assembling plans.
    pub assemble_ns: u64,
    /// Number of plans assembled.
    pub assemble_count: u64,
    /// Total nanoseconds spent rendering statements.
    pub render_ns: u64,
    /// Number of statements rendered.
    pub render_count: u64,
    /// Total nanoseconds spent stepping statements.
    pub execute_ns: u64,
    /// Number of statements executed.
    pub execute_count: u64,
    /// Total nanoseconds spent in PARIS permutation trials.
    pub permute_ns: u64,
    /// Number of features scored by permutation.
    pub permute_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    assemble_ns: AtomicU64,
    assemble_count: AtomicU64,
    render_ns: AtomicU64,
    render_count: AtomicU64,
    execute_ns: AtomicU64,
    execute_count: AtomicU64,
    permute_ns: AtomicU64,
    permute_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("BIOFILTER_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum ProfileKind {
    /// Plan assembly.
    Assemble,
    /// Statement rendering.
    Render,
    /// Statement execution, including row delivery.
    Execute,
    /// PARIS permutation trials.
    Permute,
}

pub(crate) fn record_profile_timer(kind: ProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        ProfileKind::Assemble => (&counters.assemble_ns, &counters.assemble_count),
        ProfileKind::Render => (&counters.render_ns, &counters.render_count),
        ProfileKind::Execute => (&counters.execute_ns, &counters.execute_count),
        ProfileKind::Permute => (&counters.permute_ns, &counters.permute_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current profiling metrics.
///
/// Returns `None` when `BIOFILTER_PROFILE` is unset. With `reset` the
/// counters are zeroed as they are read.
///
/// ```no_run
/// use biofilter::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(true) {
///     println!("assembled {} plans in {}ns", snapshot.assemble_count, snapshot.assemble_ns);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(QueryProfileSnapshot {
        assemble_ns: load(&counters.assemble_ns),
        assemble_count: load(&counters.assemble_count),
        render_ns: load(&counters.render_ns),
        render_count: load(&counters.render_count),
        execute_ns: load(&counters.execute_ns),
        execute_count: load(&counters.execute_count),
        permute_ns: load(&counters.permute_ns),
        permute_count: load(&counters.permute_count),
    })
}
