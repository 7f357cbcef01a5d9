//! Peripherals of the back-end node and the protocol exchanges shared by its
//! states.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    error::Error,
    hal::{ActuatorDriver, AlarmDriver, CredentialStore, SerialLink, TickSource},
    protocol::{
        Candidate, Credential, ElapsedSeconds, LinkControl, Verdict, WireSymbol, MAX_ENTRY_LEN,
        MAX_RETRIES, TERMINATOR,
    },
    settings::Settings,
};

/// Everything the back-end drives. The tick source must feed `seconds`.
pub struct ControlPeripherals {
    pub link: Box<dyn SerialLink + Send>,
    pub store: Box<dyn CredentialStore + Send>,
    pub motor: Box<dyn ActuatorDriver + Send>,
    pub alarm: Box<dyn AlarmDriver + Send>,
    pub ticker: Box<dyn TickSource + Send>,
    pub seconds: Arc<ElapsedSeconds>,
}

/// Outcome of one verification session.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Access {
    Granted,
    /// Every allowed attempt failed.
    Denied,
}

/// Data shared by all states of the back-end state machine.
pub(crate) struct ControlContext {
    pub settings: Settings,
    pub io: ControlPeripherals,
    /// Set once a credential was persisted since power-up.
    pub provisioned: bool,
}

impl ControlContext {
    pub fn new(settings: Settings, io: ControlPeripherals) -> Self {
        ControlContext {
            settings,
            io,
            provisioned: false,
        }
    }

    pub fn send<S: WireSymbol>(&mut self, symbol: S) -> Result<(), Error> {
        debug!("tx {:?}", symbol);
        self.io.link.send(symbol.into())?;
        Ok(())
    }

    /// Tell the front-end where the session resumes: `READY` while no
    /// credential was stored since power-up, `ARMED` afterwards.
    pub fn announce(&mut self) -> Result<(), Error> {
        if self.provisioned {
            self.send(LinkControl::Armed)
        } else {
            self.send(LinkControl::Ready)
        }
    }

    /// Read one credential frame: digits up to the terminator.
    ///
    /// The first byte comes whenever the user finishes typing, so only the
    /// bytes after it are read with the link timeout. Any byte other than a
    /// digit or the terminator means the peer is no longer where we think it
    /// is.
    pub fn receive_candidate(&mut self) -> Result<Candidate, Error> {
        let mut digits = Vec::with_capacity(MAX_ENTRY_LEN);
        let mut timeout = None;
        loop {
            let byte = self.io.link.receive(timeout)?;
            timeout = self.settings.read_timeout;
            match byte {
                TERMINATOR => break,
                0..=9 if digits.len() < MAX_ENTRY_LEN => digits.push(byte),
                0..=9 => return Err(Error::Desync("credential frame too long".into())),
                _ => {
                    return Err(Error::Desync(match LinkControl::decode(byte) {
                        Some(LinkControl::Resync) => "peer requested a resync".into(),
                        _ => format!("unexpected byte {:#04x} in a credential frame", byte),
                    }))
                }
            }
        }
        let candidate = Candidate::from_digits(&digits);
        if let Candidate::WrongLength(length) = candidate {
            warn!("received a {}-digit credential", length);
        }
        Ok(candidate)
    }

    /// The setup protocol: two candidates per round until they match, then
    /// persist. There is no cap on the number of rounds.
    pub fn run_setup(&mut self) -> Result<Credential, Error> {
        loop {
            let first = self.receive_candidate()?;
            let second = self.receive_candidate()?;
            match first.confirm(&second) {
                Some(credential) => {
                    self.send(Verdict::Matched)?;
                    self.io.store.store(&credential)?;
                    self.provisioned = true;
                    info!("new credential stored");
                    return Ok(credential);
                }
                None => {
                    info!("setup candidates differ");
                    self.send(Verdict::Unmatched)?;
                }
            }
        }
    }

    /// The verification protocol: the first attempt plus up to
    /// [`MAX_RETRIES`] retries, each answered with its verdict right away.
    pub fn verify(&mut self) -> Result<Access, Error> {
        let candidate = self.receive_candidate()?;
        let stored = self.io.store.load()?;

        let mut verdict = candidate.verdict_against(&stored);
        self.send(verdict)?;

        let mut retries = 0;
        while !verdict.is_match() && retries < MAX_RETRIES {
            retries += 1;
            info!("attempt {} of {} failed", retries, MAX_RETRIES + 1);
            verdict = self.receive_candidate()?.verdict_against(&stored);
            self.send(verdict)?;
        }

        Ok(if verdict.is_match() {
            Access::Granted
        } else {
            Access::Denied
        })
    }

    /// Block for `seconds` counted by the tick source. The counter is at 0
    /// before and after.
    pub fn hold_for(&mut self, seconds: u32) -> Result<(), Error> {
        self.io.ticker.start();
        let counted = self
            .io
            .seconds
            .wait_for(seconds, self.settings.tick_stall_limit());
        self.io.ticker.stop();
        debug!("phase of {} s done ({:?})", seconds, counted);
        counted?;
        Ok(())
    }
}
