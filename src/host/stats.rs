//! # Host statistics
//!
//! [`HostStatsSampler`] turns cumulative kernel counters into rates. Each
//! tick reads a [`Counters`] snapshot from its [`CounterSource`], derives
//! [`Rates`] against the previous sample and publishes an immutable
//! [`Sample`]. Readers clone the `Arc` of the latest sample, so they never see
//! a half-updated one.
//!
//! The sampler is an explicit service owned by the host system: it runs
//! between [`HostStatsSampler::start`] and [`HostStatsSampler::stop`], and
//! [`HostStatsModel`] serves the latest sample at `/host/stats`.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use resource_framework::entity::to_json;
use resource_framework::{Lookupable, ModelError, ResourceModel};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::info::meminfo_field;

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub cached: u64,
    pub buffers: u64,
    pub avail: u64,
}

/// Cumulative counters at one instant. Memory is a gauge and copied through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Jiffies spent outside idle and iowait.
    pub cpu_busy: u64,
    pub cpu_total: u64,
    pub memory: MemoryInfo,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub net_recv_bytes: u64,
    pub net_sent_bytes: u64,
}

/// Per-second rates, as served at `/host/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    /// Percent, one decimal, in `[0, 100]`.
    pub cpu_utilization: f64,
    pub memory: MemoryInfo,
    pub disk_read_rate: u64,
    pub disk_write_rate: u64,
    pub net_recv_rate: u64,
    pub net_sent_rate: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Clock reading when the counters were taken.
    pub taken_at: Duration,
    pub counters: Counters,
    pub rates: Rates,
}

fn per_second(current: u64, previous: u64, secs: f64) -> u64 {
    if secs <= 0.0 {
        return 0;
    }
    (current.saturating_sub(previous) as f64 / secs).round() as u64
}

fn cpu_percent(current: &Counters, previous: &Counters) -> f64 {
    let total = current.cpu_total.saturating_sub(previous.cpu_total);
    if total == 0 {
        return 0.0;
    }
    let busy = current.cpu_busy.saturating_sub(previous.cpu_busy);
    let percent = (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
    (percent * 10.0).round() / 10.0
}

impl Sample {
    /// Derive rates from `previous` over `elapsed`.
    pub fn next(
        taken_at: Duration,
        counters: Counters,
        previous: &Counters,
        elapsed: Duration,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let rates = Rates {
            cpu_utilization: cpu_percent(&counters, previous),
            memory: counters.memory,
            disk_read_rate: per_second(counters.disk_read_bytes, previous.disk_read_bytes, secs),
            disk_write_rate: per_second(counters.disk_write_bytes, previous.disk_write_bytes, secs),
            net_recv_rate: per_second(counters.net_recv_bytes, previous.net_recv_bytes, secs),
            net_sent_rate: per_second(counters.net_sent_bytes, previous.net_sent_bytes, secs),
        };
        Self {
            taken_at,
            counters,
            rates,
        }
    }
}

/// Where cumulative counters come from.
pub trait CounterSource: Send + Sync {
    fn read(&self) -> Result<Counters, ModelError>;

    /// Time since boot. The first sample averages over it.
    fn uptime(&self) -> Result<Duration, ModelError>;
}

/// Monotonic time source for the sampler.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Tokio's clock, so paused test time applies.
#[derive(Debug)]
pub struct TokioClock {
    origin: Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads counters from a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcCounterSource {
    root: PathBuf,
}

impl Default for ProcCounterSource {
    fn default() -> Self {
        Self::from_root("/proc")
    }
}

impl ProcCounterSource {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_file(&self, name: &str) -> Result<String, ModelError> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|e| {
            ModelError::OperationFailed(format!("cannot read {}: {e}", path.display()))
        })
    }
}

impl CounterSource for ProcCounterSource {
    fn read(&self) -> Result<Counters, ModelError> {
        let (cpu_busy, cpu_total) = parse_cpu_jiffies(&self.read_file("stat")?);
        let (disk_read_bytes, disk_write_bytes) = parse_diskstats(&self.read_file("diskstats")?);
        let (net_recv_bytes, net_sent_bytes) = parse_net_dev(&self.read_file("net/dev")?);
        Ok(Counters {
            cpu_busy,
            cpu_total,
            memory: parse_memory(&self.read_file("meminfo")?),
            disk_read_bytes,
            disk_write_bytes,
            net_recv_bytes,
            net_sent_bytes,
        })
    }

    fn uptime(&self) -> Result<Duration, ModelError> {
        parse_uptime(&self.read_file("uptime")?)
            .ok_or_else(|| ModelError::OperationFailed("malformed uptime".into()))
    }
}

/// `(busy, total)` jiffies from the aggregate `cpu` line of `/proc/stat`.
pub fn parse_cpu_jiffies(stat: &str) -> (u64, u64) {
    let Some(line) = stat.lines().find(|l| l.split_whitespace().next() == Some("cpu")) else {
        return (0, 0);
    };
    // user nice system idle iowait irq softirq steal
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .filter_map(|f| f.parse().ok())
        .collect();
    let total: u64 = fields.iter().sum();
    let idle = fields.get(3).copied().unwrap_or(0) + fields.get(4).copied().unwrap_or(0);
    (total.saturating_sub(idle), total)
}

pub fn parse_memory(meminfo: &str) -> MemoryInfo {
    let field = |name| meminfo_field(meminfo, name).unwrap_or(0);
    let (free, cached, buffers) = (field("MemFree"), field("Cached"), field("Buffers"));
    MemoryInfo {
        total: field("MemTotal"),
        free,
        cached,
        buffers,
        avail: meminfo_field(meminfo, "MemAvailable").unwrap_or(free + cached + buffers),
    }
}

/// Whether `name` is a partition of another listed device (`sda1` of `sda`,
/// `nvme0n1p2` of `nvme0n1`).
fn is_partition(name: &str, devices: &BTreeSet<&str>) -> bool {
    devices.iter().any(|dev| {
        name.strip_prefix(dev).is_some_and(|rest| {
            let digits = rest.strip_prefix('p').unwrap_or(rest);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        })
    })
}

/// `(read, written)` bytes over whole disks from `/proc/diskstats`.
/// Sectors there are always 512 bytes.
pub fn parse_diskstats(text: &str) -> (u64, u64) {
    let rows: Vec<Vec<&str>> = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .filter(|f| f.len() >= 10)
        .collect();
    let devices: BTreeSet<&str> = rows.iter().map(|f| f[2]).collect();
    rows.iter()
        .filter(|f| {
            let name = f[2];
            !name.starts_with("loop") && !name.starts_with("ram") && !is_partition(name, &devices)
        })
        .fold((0, 0), |(read, written), f| {
            let sectors = |i: usize| f[i].parse::<u64>().unwrap_or(0);
            (read + sectors(5) * 512, written + sectors(9) * 512)
        })
}

/// `(received, sent)` bytes over all interfaces but loopback.
pub fn parse_net_dev(text: &str) -> (u64, u64) {
    text.lines()
        .filter_map(|line| {
            let (iface, rest) = line.split_once(':')?;
            if iface.trim() == "lo" {
                return None;
            }
            let fields: Vec<u64> = rest
                .split_whitespace()
                .map(|f| f.parse().unwrap_or(0))
                .collect();
            Some((*fields.first()?, *fields.get(8)?))
        })
        .fold((0, 0), |(rx, tx), (r, t)| (rx + r, tx + t))
}

pub fn parse_uptime(text: &str) -> Option<Duration> {
    let secs = text.split_whitespace().next()?.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Periodic sampler of host counters.
pub struct HostStatsSampler {
    source: Arc<dyn CounterSource>,
    clock: Arc<dyn Clock>,
    latest: RwLock<Option<Arc<Sample>>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HostStatsSampler {
    pub fn new(source: Arc<dyn CounterSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            latest: RwLock::new(None),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// The most recent sample, if any was taken.
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take one sample now and publish it.
    pub fn sample_now(&self) -> Result<Arc<Sample>, ModelError> {
        let counters = self.source.read()?;
        let now = self.clock.now();
        let sample = match self.latest() {
            Some(prev) => Sample::next(
                now,
                counters,
                &prev.counters,
                now.saturating_sub(prev.taken_at),
            ),
            None => Sample::next(now, counters, &Counters::default(), self.source.uptime()?),
        };
        let sample = Arc::new(sample);
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&sample));
        Ok(sample)
    }

    /// Sample every `interval` until [`stop`](Self::stop). The first sample
    /// is taken immediately. Calling `start` twice has no effect.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            warn!("Host stats sampler already running");
            return;
        }
        let sampler = Arc::clone(self);
        *worker = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Host stats sampler started");
            loop {
                tokio::select! {
                    _ = sampler.cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        match sampler.sample_now() {
                            Ok(sample) => debug!(rates = ?sample.rates, "Host stats sampled"),
                            Err(e) => warn!(error = %e, "Host stats sampling failed"),
                        }
                    }
                }
            }
            info!("Host stats sampler stopped");
        }));
    }

    /// Stop sampling and wait for the worker to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Host stats sampler ended abnormally");
            }
        }
    }
}

/// `/host/stats`
pub struct HostStatsModel {
    sampler: Arc<HostStatsSampler>,
}

impl HostStatsModel {
    pub fn new(sampler: Arc<HostStatsSampler>) -> Self {
        Self { sampler }
    }
}

#[async_trait]
impl Lookupable for HostStatsModel {
    async fn lookup(&self, _ident: &[String]) -> Result<Value, ModelError> {
        let sample = match self.sampler.latest() {
            Some(sample) => sample,
            None => self.sampler.sample_now()?,
        };
        to_json(&sample.rates)
    }
}

impl ResourceModel for HostStatsModel {
    fn kind(&self) -> &'static str {
        "hoststats"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct FakeCounters {
        counters: Mutex<Counters>,
    }

    impl FakeCounters {
        fn set(&self, counters: Counters) {
            *self.counters.lock().unwrap() = counters;
        }
    }

    impl CounterSource for FakeCounters {
        fn read(&self) -> Result<Counters, ModelError> {
            Ok(*self.counters.lock().unwrap())
        }

        fn uptime(&self) -> Result<Duration, ModelError> {
            Ok(Duration::from_secs(100))
        }
    }

    fn sampler() -> (Arc<HostStatsSampler>, Arc<FakeCounters>, Arc<ManualClock>) {
        let source = Arc::new(FakeCounters::default());
        let clock = Arc::new(ManualClock::default());
        let sampler = Arc::new(HostStatsSampler::new(
            Arc::clone(&source) as Arc<dyn CounterSource>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        (sampler, source, clock)
    }

    #[test]
    fn first_sample_averages_over_uptime() {
        let (sampler, source, _) = sampler();
        source.set(Counters {
            disk_read_bytes: 10_000,
            net_sent_bytes: 250,
            ..Counters::default()
        });
        let sample = sampler.sample_now().unwrap();
        assert_eq!(sample.rates.disk_read_rate, 100);
        // 2.5 rounds away from zero
        assert_eq!(sample.rates.net_sent_rate, 3);
    }

    #[test]
    fn later_samples_use_the_elapsed_interval() {
        let (sampler, source, clock) = sampler();
        source.set(Counters {
            cpu_busy: 100,
            cpu_total: 1000,
            net_recv_bytes: 5000,
            disk_write_bytes: 8000,
            ..Counters::default()
        });
        sampler.sample_now().unwrap();

        clock.advance(Duration::from_secs(2));
        source.set(Counters {
            cpu_busy: 150,
            cpu_total: 1200,
            net_recv_bytes: 9000,
            // counter reset
            disk_write_bytes: 10,
            ..Counters::default()
        });
        let sample = sampler.sample_now().unwrap();
        assert_eq!(sample.taken_at, Duration::from_secs(2));
        assert_eq!(sample.rates.net_recv_rate, 2000);
        assert_eq!(sample.rates.disk_write_rate, 0);
        assert_eq!(sample.rates.cpu_utilization, 25.0);
        assert_eq!(sampler.latest(), Some(sample));
    }

    #[test]
    fn zero_elapsed_time_yields_zero_rates() {
        let (sampler, source, _) = sampler();
        sampler.sample_now().unwrap();
        source.set(Counters {
            net_recv_bytes: 1,
            ..Counters::default()
        });
        assert_eq!(sampler.sample_now().unwrap().rates.net_recv_rate, 0);
    }

    #[test]
    fn proc_parsers() {
        let stat = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 1 2 3 4\n";
        assert_eq!(parse_cpu_jiffies(stat), (200, 1000));

        let diskstats = "   8       0 sda 10 0 100 0 20 0 200 0 0 0 0\n   8       1 sda1 10 0 100 0 20 0 200 0 0 0 0\n   7       0 loop0 1 0 999 0 1 0 999 0 0 0 0\n 259       0 nvme0n1 1 0 4 0 1 0 2 0 0 0 0\n 259       1 nvme0n1p1 1 0 4 0 1 0 2 0 0 0 0\n";
        assert_eq!(parse_diskstats(diskstats), (104 * 512, 202 * 512));

        let net = "Inter-|   Receive\n face |bytes packets\n    lo: 999 1 0 0 0 0 0 0 999 1 0 0 0 0 0 0\n  eth0: 100 1 0 0 0 0 0 0 50 1 0 0 0 0 0 0\n  eth1: 1 1 0 0 0 0 0 0 2 1 0 0 0 0 0 0\n";
        assert_eq!(parse_net_dev(net), (101, 52));

        assert_eq!(parse_uptime("350735.47 234388.90\n"), Some(Duration::from_secs_f64(350735.47)));

        let meminfo = "MemTotal: 4 kB\nMemFree: 1 kB\nBuffers: 1 kB\nCached: 1 kB\n";
        assert_eq!(
            parse_memory(meminfo),
            MemoryInfo {
                total: 4096,
                free: 1024,
                cached: 1024,
                buffers: 1024,
                avail: 3072,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn started_sampler_publishes_until_stopped() {
        let (sampler, source, clock) = sampler();
        source.set(Counters {
            net_recv_bytes: 100,
            ..Counters::default()
        });
        sampler.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = sampler.latest().unwrap();

        clock.advance(Duration::from_secs(1));
        source.set(Counters {
            net_recv_bytes: 600,
            ..Counters::default()
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = sampler.latest().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.rates.net_recv_rate, 500);

        sampler.stop().await;
        clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(Arc::ptr_eq(&second, &sampler.latest().unwrap()));
    }

    #[tokio::test]
    async fn model_serves_rates() {
        let (sampler, source, _) = sampler();
        source.set(Counters {
            memory: MemoryInfo {
                total: 8,
                free: 4,
                cached: 2,
                buffers: 1,
                avail: 7,
            },
            ..Counters::default()
        });
        let info = HostStatsModel::new(sampler).lookup(&[]).await.unwrap();
        assert_eq!(
            info,
            json!({
                "cpu_utilization": 0.0,
                "memory": {"total": 8, "free": 4, "cached": 2, "buffers": 1, "avail": 7},
                "disk_read_rate": 0,
                "disk_write_rate": 0,
                "net_recv_rate": 0,
                "net_sent_rate": 0,
            })
        );
    }
}
