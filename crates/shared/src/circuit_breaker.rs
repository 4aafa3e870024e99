//! 熔断器 (Circuit Breaker) 模块
//!
//! 实现标准的三态熔断器模式，用于保护对外部依赖（如积分计算服务）的调用。
//! 与按连续失败次数跳闸的实现不同，这里按滚动窗口内的失败比例判断：
//! 请求数超过 `min_requests` 且失败率达到 `failure_ratio` 时跳闸（Open），
//! 冷却期结束后放行有限的探测请求（Half-Open），探测全部成功则恢复（Closed），
//! 任一探测失败则重新跳闸并重新计时。
//!
//! ## 并发模型
//!
//! - 状态与计数器由同一把 `parking_lot::Mutex` 保护，每次调用的"放行判断"与
//!   "结果记录"各自在锁内原子完成，并发调用的结果不会互相覆盖
//! - 每次状态切换都会推进 `generation`，旧代际发起的调用返回时其结果被丢弃，
//!   避免 Closed 期间发起的慢请求在 Half-Open 阶段被误当作探测结果
//! - 锁内不做任何 I/O，被保护的调用本身在锁外执行

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 正常放行所有请求
    Closed,
    /// 断路器跳闸，拒绝所有请求
    Open,
    /// 允许少量探测请求，成功则恢复
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// 熔断器配置
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// 熔断器名称，用于日志和指标区分不同的依赖
    pub name: String,
    /// 请求数必须严格大于该值才会评估失败率（默认 3）
    pub min_requests: u32,
    /// 跳闸失败率阈值，闭区间（默认 0.6）
    pub failure_ratio: f64,
    /// 跳闸后的冷却时长，到期进入半开状态（默认 10 秒）
    pub open_timeout: Duration,
    /// 半开状态允许的探测请求数，连续成功该数量后恢复（默认 2）
    pub half_open_max_requests: u32,
    /// Closed 状态下计数器的清零周期，`None` 表示只在状态切换时清零
    pub rolling_window: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_requests: 3,
            failure_ratio: 0.6,
            open_timeout: Duration::from_secs(10),
            half_open_max_requests: 2,
            rolling_window: None,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_min_requests(mut self, min_requests: u32) -> Self {
        self.min_requests = min_requests;
        self
    }

    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_half_open_max_requests(mut self, permits: u32) -> Self {
        // 0 个探测名额会让熔断器永远无法恢复
        self.half_open_max_requests = permits.max(1);
        self
    }

    pub fn with_rolling_window(mut self, window: Option<Duration>) -> Self {
        self.rolling_window = window;
        self
    }

    /// 跳闸判定：请求数 > min_requests 且失败率 ≥ failure_ratio
    fn ready_to_trip(&self, counts: &Counts) -> bool {
        if counts.requests <= self.min_requests {
            return false;
        }
        let ratio = f64::from(counts.total_failures) / f64::from(counts.requests);
        ratio >= self.failure_ratio
    }
}

/// 当前代际内的请求计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// 熔断器内部状态，受 Mutex 保护
struct InnerState {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// Closed：计数窗口到期时间；Open：冷却到期时间；HalfOpen：无
    expiry: Option<Instant>,
    last_state_change: Instant,
}

/// 调用许可，记录放行时的代际
#[derive(Debug, Clone, Copy)]
pub struct CallPermit {
    generation: u64,
}

/// 熔断器
///
/// 线程安全，克隆后共享同一份状态，可在多个调用方之间通过克隆传递。
/// 典型用法：
/// ```ignore
/// let cb = CircuitBreaker::new(CircuitBreakerConfig::new("accrual"));
/// let info = cb.call(|| client.fetch(number)).await?;
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<InnerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        info!(
            name = %config.name,
            min_requests = config.min_requests,
            failure_ratio = config.failure_ratio,
            open_timeout_ms = config.open_timeout.as_millis() as u64,
            half_open_max_requests = config.half_open_max_requests,
            "熔断器已创建"
        );

        let now = Instant::now();
        let expiry = config.rolling_window.map(|w| now + w);

        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(InnerState {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
                last_state_change: now,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 获取当前状态（会顺带完成到期的状态切换）
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now()).0
    }

    /// 当前代际的计数快照
    pub fn counts(&self) -> Counts {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now());
        inner.counts
    }

    /// 最近一次状态切换的时间
    pub fn last_state_change(&self) -> Instant {
        self.inner.lock().last_state_change
    }

    /// 申请调用许可
    ///
    /// Open：直接拒绝；HalfOpen：探测名额用尽后拒绝；Closed：始终放行。
    pub fn try_acquire(&self) -> Result<CallPermit, CircuitBreakerError<std::convert::Infallible>> {
        let mut inner = self.inner.lock();
        let (state, generation) = self.current_state(&mut inner, Instant::now());

        match state {
            CircuitState::Open => {
                return Err(CircuitBreakerError::Open {
                    name: self.config.name.clone(),
                });
            }
            CircuitState::HalfOpen
                if inner.counts.requests >= self.config.half_open_max_requests =>
            {
                return Err(CircuitBreakerError::TooManyTrialRequests {
                    name: self.config.name.clone(),
                });
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(CallPermit { generation })
    }

    /// 记录一次已放行调用的结果
    pub fn record(&self, permit: CallPermit, success: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let (state, generation) = self.current_state(&mut inner, now);

        // 许可来自旧代际，其所属窗口已被重置
        if generation != permit.generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == CircuitState::HalfOpen
                && inner.counts.consecutive_successes >= self.config.half_open_max_requests
            {
                self.transition_to(&mut inner, CircuitState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match state {
                CircuitState::Closed => {
                    if self.config.ready_to_trip(&inner.counts) {
                        self.transition_to(&mut inner, CircuitState::Open, now);
                    }
                }
                CircuitState::HalfOpen => {
                    self.transition_to(&mut inner, CircuitState::Open, now);
                }
                CircuitState::Open => {}
            }
        }
    }

    /// 执行受熔断器保护的异步调用
    ///
    /// 熔断器拒绝时不会执行 `f`；否则根据 `f` 的 `Ok`/`Err` 记录成功或失败。
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let permit = match self.try_acquire() {
            Ok(permit) => permit,
            Err(rejection) => {
                record_circuit_breaker_rejection(&self.config.name);
                return Err(rejection.widen());
            }
        };

        match f().await {
            Ok(value) => {
                self.record(permit, true);
                Ok(value)
            }
            Err(e) => {
                self.record(permit, false);
                Err(CircuitBreakerError::ServiceError(e))
            }
        }
    }

    /// 计算当前状态并处理到期切换，返回 (状态, 代际)
    fn current_state(&self, inner: &mut InnerState, now: Instant) -> (CircuitState, u64) {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.transition_to(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
        (inner.state, inner.generation)
    }

    fn new_generation(&self, inner: &mut InnerState, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitState::Closed => self.config.rolling_window.map(|w| now + w),
            CircuitState::Open => Some(now + self.config.open_timeout),
            CircuitState::HalfOpen => None,
        };
    }

    /// 状态转换（在锁内调用）
    fn transition_to(&self, inner: &mut InnerState, new_state: CircuitState, now: Instant) {
        let old_state = inner.state;
        if old_state == new_state {
            return;
        }

        let counts = inner.counts;
        inner.state = new_state;
        inner.last_state_change = now;
        self.new_generation(inner, now);

        record_circuit_breaker_transition(&self.config.name, old_state, new_state);

        match new_state {
            CircuitState::Open => {
                warn!(
                    name = %self.config.name,
                    from = %old_state,
                    requests = counts.requests,
                    failures = counts.total_failures,
                    cooldown_ms = self.config.open_timeout.as_millis() as u64,
                    "熔断器跳闸：失败率达到阈值，冷却期内请求将被直接拒绝"
                );
            }
            CircuitState::HalfOpen => {
                info!(
                    name = %self.config.name,
                    permits = self.config.half_open_max_requests,
                    "熔断器进入半开状态：允许探测请求"
                );
            }
            CircuitState::Closed => {
                info!(name = %self.config.name, "熔断器恢复：依赖已恢复正常");
            }
        }
    }
}

/// 熔断器错误
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// 熔断器跳闸，请求被拒绝
    Open { name: String },
    /// 半开状态探测名额已用尽
    TooManyTrialRequests { name: String },
    /// 底层调用失败
    ServiceError(E),
}

impl<E> CircuitBreakerError<E> {
    /// 是否为熔断器自身拒绝（底层依赖未被调用）
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::TooManyTrialRequests { .. })
    }
}

impl CircuitBreakerError<std::convert::Infallible> {
    fn widen<E>(self) -> CircuitBreakerError<E> {
        match self {
            Self::Open { name } => CircuitBreakerError::Open { name },
            Self::TooManyTrialRequests { name } => CircuitBreakerError::TooManyTrialRequests { name },
            Self::ServiceError(never) => match never {},
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { name } => write!(f, "熔断器 '{}' 处于跳闸状态，请求被拒绝", name),
            Self::TooManyTrialRequests { name } => {
                write!(f, "熔断器 '{}' 半开探测名额已用尽，请求被拒绝", name)
            }
            Self::ServiceError(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for CircuitBreakerError<E> {}

// ─── Prometheus 指标 ─────────────────────────────────────────────────

/// 记录状态转换
fn record_circuit_breaker_transition(name: &str, from: CircuitState, to: CircuitState) {
    metrics::counter!(
        "circuit_breaker_transitions_total",
        "name" => name.to_string(),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);

    let state_value = match to {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!(
        "circuit_breaker_state",
        "name" => name.to_string()
    )
    .set(state_value);
}

/// 记录请求被拒绝
fn record_circuit_breaker_rejection(name: &str) {
    metrics::counter!(
        "circuit_breaker_rejections_total",
        "name" => name.to_string()
    )
    .increment(1);
}
