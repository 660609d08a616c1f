//! Bus power-domain bracketing
//!
//! The SPI controller is powered only while the worker is talking to the
//! sensor. [`PowerBracket::with_bus_active`] resumes the domain, runs the
//! transactions, and suspends it again on every exit path, including an
//! unwinding panic inside the body.

use log::{debug, error};

use crate::error::Result;
use crate::status::{BusStatus, BUS_OK, EALREADY};

/// Power state of the bus domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusPowerState {
    #[default]
    Suspended,
    Active,
}

/// Power-domain capability of the bus controller
pub trait PowerDomain {
    /// Resume the domain; blocks until it reports ready
    fn resume(&mut self) -> BusStatus;

    /// Suspend the domain
    fn suspend(&mut self) -> BusStatus;
}

impl<P: PowerDomain + ?Sized> PowerDomain for Box<P> {
    fn resume(&mut self) -> BusStatus {
        (**self).resume()
    }

    fn suspend(&mut self) -> BusStatus {
        (**self).suspend()
    }
}

/// Resume/suspend bracket around a batch of bus transactions
pub struct PowerBracket<P: PowerDomain> {
    domain: P,
    state: BusPowerState,
    resume_count: u64,
    suspend_count: u64,
}

impl<P: PowerDomain> PowerBracket<P> {
    /// Wrap a domain that is currently suspended
    pub fn new(domain: P) -> Self {
        Self {
            domain,
            state: BusPowerState::Suspended,
            resume_count: 0,
            suspend_count: 0,
        }
    }

    pub fn state(&self) -> BusPowerState {
        self.state
    }

    pub fn resume_count(&self) -> u64 {
        self.resume_count
    }

    pub fn suspend_count(&self) -> u64 {
        self.suspend_count
    }

    pub fn domain(&self) -> &P {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut P {
        &mut self.domain
    }

    /// Force the domain into suspend, e.g. once startup configuration is done
    pub fn suspend(&mut self) -> Result<()> {
        let status = self.domain.suspend();
        self.state = BusPowerState::Suspended;
        self.suspend_count += 1;
        if !transition_ok(status) {
            error!("Bus suspend failed, err: {}", status);
            return Err(status.into());
        }
        Ok(())
    }

    /// Run `body` with the bus powered
    ///
    /// If resume fails the body does not run and the domain stays suspended.
    /// A suspend failure on exit is logged; the body's result is still
    /// returned.
    pub fn with_bus_active<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        let status = self.domain.resume();
        if !transition_ok(status) {
            error!("Bus resume failed, err: {}", status);
            return Err(status.into());
        }
        self.state = BusPowerState::Active;
        self.resume_count += 1;
        debug!("bus active");

        let guard = ActiveGuard { bracket: self };
        let value = body();
        drop(guard);

        Ok(value)
    }

    fn close(&mut self) {
        let status = self.domain.suspend();
        self.state = BusPowerState::Suspended;
        self.suspend_count += 1;
        if !transition_ok(status) {
            error!("Bus suspend failed, err: {}", status);
        } else {
            debug!("bus suspended");
        }
    }
}

// The domain already being in the requested state is not a failure
fn transition_ok(status: BusStatus) -> bool {
    status == BUS_OK || status == EALREADY
}

/// Suspends the domain when dropped, so unwinding also closes the bracket
struct ActiveGuard<'a, P: PowerDomain> {
    bracket: &'a mut PowerBracket<P>,
}

impl<P: PowerDomain> Drop for ActiveGuard<'_, P> {
    fn drop(&mut self) {
        self.bracket.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionError;
    use crate::status::{EIO, ETIMEDOUT};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct DomainLog {
        events: Vec<&'static str>,
        resume_status: BusStatus,
        suspend_status: BusStatus,
    }

    struct RecordingDomain(Rc<RefCell<DomainLog>>);

    impl PowerDomain for RecordingDomain {
        fn resume(&mut self) -> BusStatus {
            let mut log = self.0.borrow_mut();
            log.events.push("resume");
            log.resume_status
        }

        fn suspend(&mut self) -> BusStatus {
            let mut log = self.0.borrow_mut();
            log.events.push("suspend");
            log.suspend_status
        }
    }

    fn bracket() -> (PowerBracket<RecordingDomain>, Rc<RefCell<DomainLog>>) {
        let log = Rc::new(RefCell::new(DomainLog::default()));
        (PowerBracket::new(RecordingDomain(log.clone())), log)
    }

    #[test]
    fn test_body_runs_between_resume_and_suspend() {
        let (mut bracket, log) = bracket();
        let inner = log.clone();
        let value = bracket
            .with_bus_active(|| {
                inner.borrow_mut().events.push("body");
                7
            })
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(log.borrow().events, vec!["resume", "body", "suspend"]);
        assert_eq!(bracket.state(), BusPowerState::Suspended);
        assert_eq!(bracket.resume_count(), 1);
        assert_eq!(bracket.suspend_count(), 1);
    }

    #[test]
    fn test_failing_body_still_suspends() {
        let (mut bracket, log) = bracket();
        let result: Result<std::result::Result<(), AcquisitionError>> =
            bracket.with_bus_active(|| Err(AcquisitionError::from(EIO)));

        assert!(matches!(result, Ok(Err(AcquisitionError::BusTransfer { .. }))));
        assert_eq!(bracket.state(), BusPowerState::Suspended);
        assert_eq!(log.borrow().events, vec!["resume", "suspend"]);
    }

    #[test]
    fn test_panicking_body_still_suspends() {
        let (mut bracket, log) = bracket();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bracket.with_bus_active(|| panic!("transfer exploded"))
        }));

        assert!(outcome.is_err());
        assert_eq!(bracket.state(), BusPowerState::Suspended);
        assert_eq!(log.borrow().events, vec!["resume", "suspend"]);
    }

    #[test]
    fn test_failed_resume_skips_body() {
        let (mut bracket, log) = bracket();
        log.borrow_mut().resume_status = ETIMEDOUT;

        let mut ran = false;
        let result = bracket.with_bus_active(|| ran = true);

        assert!(matches!(
            result,
            Err(AcquisitionError::BusTransfer { status: ETIMEDOUT, .. })
        ));
        assert!(!ran);
        assert_eq!(bracket.state(), BusPowerState::Suspended);
        assert_eq!(log.borrow().events, vec!["resume"]);
    }

    #[test]
    fn test_failed_suspend_returns_body_value() {
        let (mut bracket, log) = bracket();
        log.borrow_mut().suspend_status = EIO;

        assert_eq!(bracket.with_bus_active(|| 3).unwrap(), 3);
        assert_eq!(bracket.state(), BusPowerState::Suspended);
    }

    #[test]
    fn test_already_in_state_is_not_an_error() {
        let (mut bracket, log) = bracket();
        log.borrow_mut().resume_status = EALREADY;
        log.borrow_mut().suspend_status = EALREADY;

        assert_eq!(bracket.with_bus_active(|| 1).unwrap(), 1);
        assert!(bracket.suspend().is_ok());
        assert_eq!(log.borrow().events, vec!["resume", "suspend", "suspend"]);
    }
}
