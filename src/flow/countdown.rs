use std::{num::NonZeroU32, time::Duration};

use tokio::time::{Instant, Interval, interval_at};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick(u32),
    Timeout,
}

/// One-second countdown. Events take the place of tick/timeout callbacks:
/// every tick yields `Tick(remaining)`, reaching zero yields one `Timeout`,
/// and after that (or after `cancel`) `next_event` yields nothing.
pub struct Countdown {
    total: u32,
    remaining: u32,
    ticker: Interval,
    timeout_pending: bool,
    stopped: bool,
}

impl Countdown {
    pub fn start(total: NonZeroU32) -> Self {
        Countdown {
            total: total.get(),
            remaining: total.get(),
            ticker: interval_at(Instant::now() + TICK, TICK),
            timeout_pending: false,
            stopped: false,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn cancel(&mut self) {
        self.stopped = true;
        self.timeout_pending = false;
    }

    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        if self.stopped {
            return None;
        }

        // Tick(0) is reported before the timeout itself.
        if self.timeout_pending {
            self.timeout_pending = false;
            self.stopped = true;
            return Some(CountdownEvent::Timeout);
        }

        self.ticker.tick().await;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.timeout_pending = true;
        }

        Some(CountdownEvent::Tick(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, time::Duration};

    use tokio::time::Instant;

    use crate::flow::countdown::{Countdown, CountdownEvent};

    fn seconds(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_a_single_timeout() {
        let started = Instant::now();
        let mut countdown = Countdown::start(seconds(3));

        let mut events = vec![];
        while let Some(event) = countdown.next_event().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                CountdownEvent::Tick(2),
                CountdownEvent::Tick(1),
                CountdownEvent::Tick(0),
                CountdownEvent::Timeout,
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(!countdown.is_running());
        assert_eq!(countdown.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_never_increases() {
        let mut countdown = Countdown::start(seconds(300));
        let mut last = countdown.remaining();
        let mut timeouts = 0;

        while let Some(event) = countdown.next_event().await {
            match event {
                CountdownEvent::Tick(remaining) => {
                    assert!(remaining < last);
                    assert!(remaining <= countdown.total());
                    last = remaining;
                }
                CountdownEvent::Timeout => timeouts += 1,
            }
        }

        assert_eq!(last, 0);
        assert_eq!(timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_second() {
        let started = Instant::now();
        let mut countdown = Countdown::start(seconds(10));

        assert_eq!(countdown.next_event().await, Some(CountdownEvent::Tick(9)));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_silences() {
        let mut countdown = Countdown::start(seconds(5));
        assert_eq!(countdown.next_event().await, Some(CountdownEvent::Tick(4)));

        countdown.cancel();
        countdown.cancel();

        assert!(!countdown.is_running());
        assert_eq!(countdown.next_event().await, None);
        assert_eq!(countdown.remaining(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_between_last_tick_and_timeout() {
        let mut countdown = Countdown::start(seconds(1));
        assert_eq!(countdown.next_event().await, Some(CountdownEvent::Tick(0)));

        countdown.cancel();

        assert_eq!(countdown.next_event().await, None);
    }
}
