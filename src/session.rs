use log::{debug, info, warn};
use std::io::Write;

use crate::prompt::{Prompt, PromptSync};
use crate::table::{self, MAX_CAL_ID};
use crate::transport::InstrumentTransport;
use crate::types::{
    CalError, CalibrationReading, DumpSummary, InvalidId, PromptPolicy, QueryOutcome,
    SessionConfig,
};

/// Where a session is in its single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, handshake not done
    Opened,
    Identified,
    Dumping,
}

/// One run against one instrument.
///
/// The session owns the transport; dropping it (or calling [`close`](Self::close)
/// or [`reboot`](Self::reboot)) releases the port.
pub struct CalSession<T: InstrumentTransport> {
    sync: PromptSync<T>,
    config: SessionConfig,
    state: SessionState,
    identity: Option<String>,
    /// The last exchange ended without a prompt line, leftovers may still arrive
    needs_resync: bool,
}

impl<T: InstrumentTransport> CalSession<T> {
    const IDENTIFY: &'static str = "*IDN?";
    const CAL_CONST: &'static str = "CAL_CONST?";
    const REBOOT: &'static str = "autarch;reboot";

    /// Notice printed ahead of every dump
    pub const LOSSY_WARNING: &'static str = "warning: the instrument reports constants as rounded decimal text; \
         raw data below is the nearest 32-bit float to that text and may differ \
         from the stored value in the last bits";

    /// Create a session over an already opened transport
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let sync = PromptSync::new(transport, config.read_timeout);
        Self {
            sync,
            config,
            state: SessionState::Opened,
            identity: None,
            needs_resync: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identification string from the handshake, once it ran
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Whether the most recent prompt check saw `=>`
    pub fn prompt_seen(&self) -> bool {
        self.sync.prompt_seen()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Send `*IDN?` and record whatever comes back.
    ///
    /// The reply is not validated, and a missing prompt afterwards is only logged.
    pub fn identify(&mut self) -> Result<&str, CalError> {
        self.sync.clear_input()?;
        self.sync.send_line(Self::IDENTIFY)?;
        let line = self.sync.read_line()?;
        if line.is_silent() {
            warn!("No identification reply before timeout");
        }
        if !self.sync.wait_for_prompt()? {
            warn!("No prompt after identification, continuing");
            self.needs_resync = self.sync.last_prompt().is_none();
        }
        info!("Connected to: {}", line.text);
        self.state = SessionState::Identified;
        Ok(self.identity.insert(line.text).as_str())
    }

    /// Query one calibration constant.
    ///
    /// Odd ids and ids past the table are refused without touching the transport.
    pub fn get_cal_const(&mut self, id: u32) -> Result<QueryOutcome, CalError> {
        self.require_identified()?;

        if id % 2 != 0 {
            warn!("Refusing const {}: ID must be even", id);
            return Ok(QueryOutcome::InvalidRequest(InvalidId::Odd(id)));
        }
        if id > MAX_CAL_ID {
            warn!("Refusing const {}: ID out of range", id);
            return Ok(QueryOutcome::InvalidRequest(InvalidId::OutOfRange(id)));
        }

        if self.needs_resync {
            let discarded = self.sync.resync()?;
            if discarded > 0 {
                warn!("Discarded {} stale lines before const {}", discarded, id);
            }
            self.needs_resync = false;
        }
        self.sync.clear_input()?;

        self.sync.send_line(&format!("{} {}", Self::CAL_CONST, id))?;
        let reply = self.sync.read_line()?;
        if reply.is_silent() {
            warn!("No reply to const {}", id);
            self.needs_resync = true;
            return Ok(QueryOutcome::NoReply { id });
        }

        let prompt = Prompt::from_line(&reply.text);
        if reply.timed_out && prompt.is_none() {
            warn!("Reply to const {} cut off by timeout: {:?}", id, reply.text);
            self.needs_resync = true;
            return Ok(QueryOutcome::MalformedReply { id, text: reply.text });
        }

        let Some(reading) = CalibrationReading::recover(id, &reply.text) else {
            warn!("Malformed reply to const {}: {:?}", id, reply.text);
            match prompt {
                // A stale acknowledgment; the real answer is still on its way.
                Some(Prompt::Ok) => self.needs_resync = true,
                // The command was rejected and nothing else is coming.
                Some(_) => {}
                None => {
                    if !self.sync.wait_for_prompt()? {
                        self.needs_resync = self.sync.last_prompt().is_none();
                    }
                }
            }
            return Ok(QueryOutcome::MalformedReply { id, text: reply.text });
        };
        debug!("const {} = {} -> {:08X}", id, reading.value, reading.bits);

        if self.sync.wait_for_prompt()? {
            return Ok(QueryOutcome::Reading(reading));
        }
        self.needs_resync = self.sync.last_prompt().is_none();
        match self.config.prompt_policy {
            PromptPolicy::Require => {
                warn!("No prompt after const {}, dropping reading", id);
                Ok(QueryOutcome::DroppedNoPrompt(reading))
            }
            PromptPolicy::Tolerate => {
                warn!("No prompt after const {}, keeping reading", id);
                Ok(QueryOutcome::Reading(reading))
            }
        }
    }

    /// Query every constant in table order and write a report to `out`.
    ///
    /// Per-constant failures are reported inline and counted; only transport
    /// failures, a write error on `out`, or the give-up policy end the dump early.
    pub fn dump_cal<W: Write>(&mut self, out: &mut W) -> Result<DumpSummary, CalError> {
        self.require_identified()?;
        self.state = SessionState::Dumping;
        let result = self.dump_inner(out);
        self.state = SessionState::Identified;
        result
    }

    fn dump_inner<W: Write>(&mut self, out: &mut W) -> Result<DumpSummary, CalError> {
        warn!("Recovered bit patterns are approximations of the stored constants");
        writeln!(out, "{}", Self::LOSSY_WARNING)?;

        let mut summary = DumpSummary::default();
        let mut silent_run = 0u32;

        for id in table::dump_ids() {
            let outcome = self.get_cal_const(id)?;
            summary.record(&outcome);
            writeln!(out, "{}", outcome)?;

            if let QueryOutcome::NoReply { .. } = outcome {
                silent_run += 1;
                if self.config.give_up_after > 0 && silent_run >= self.config.give_up_after {
                    writeln!(out, "giving up after {} unanswered queries", silent_run)?;
                    return Err(CalError::Unresponsive {
                        consecutive: silent_run,
                    });
                }
            } else {
                silent_run = 0;
            }
        }

        writeln!(
            out,
            "{} of {} constants recovered",
            summary.recovered,
            summary.recovered + summary.failed()
        )?;
        info!("Dump finished: {:?}", summary);
        Ok(summary)
    }

    /// Send the privileged reboot and end the session.
    ///
    /// The instrument drops the line straight away, so nothing is read back.
    pub fn reboot(mut self) -> Result<(), CalError> {
        self.require_identified()?;
        info!("Rebooting instrument");
        self.sync.send_line(Self::REBOOT)
    }

    /// End the session and hand back the transport
    pub fn close(self) -> T {
        self.sync.into_transport()
    }

    fn require_identified(&self) -> Result<(), CalError> {
        match self.state {
            SessionState::Opened => Err(CalError::NotIdentified),
            SessionState::Identified | SessionState::Dumping => Ok(()),
        }
    }
}
