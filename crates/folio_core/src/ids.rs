/// Wall-clock source in milliseconds since the Unix epoch.
pub trait MillisClock {
    fn now_millis(&self) -> i64;
}

impl<F> MillisClock for F
where
    F: Fn() -> i64,
{
    fn now_millis(&self) -> i64 {
        self()
    }
}

/// Time-ordered unique ids of the form `<prefix>-<millis>-<n>`.
///
/// `n` disambiguates ids minted within the same millisecond; a clock that
/// stalls or runs backwards keeps the last seen millisecond.
pub struct IdGenerator {
    prefix: &'static str,
    clock: Box<dyn MillisClock>,
    last_millis: i64,
    counter: u32,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("prefix", &self.prefix)
            .field("last_millis", &self.last_millis)
            .field("counter", &self.counter)
            .finish()
    }
}

impl IdGenerator {
    pub fn new(prefix: &'static str, clock: impl MillisClock + 'static) -> Self {
        Self {
            prefix,
            clock: Box::new(clock),
            last_millis: i64::MIN,
            counter: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        let now = self.clock.now_millis();
        if now > self.last_millis {
            self.last_millis = now;
            self.counter = 0;
        } else {
            self.counter += 1;
        }
        format!("{}-{}-{}", self.prefix, self.last_millis, self.counter)
    }
}
