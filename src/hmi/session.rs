//! Peripherals of the front-end node and the prompts and protocol exchanges
//! shared by its states.

use log::{debug, warn};

use crate::{
    error::{Error, LinkError},
    hal::{DisplayDriver, InputDriver, Key, SerialLink},
    protocol::{encode_entry, LinkControl, Notice, Verdict, WireSymbol, MAX_ENTRY_LEN, MAX_RETRIES},
    settings::Settings,
};

/// Everything the front-end drives.
pub struct HmiPeripherals {
    pub link: Box<dyn SerialLink + Send>,
    pub display: Box<dyn DisplayDriver + Send>,
    pub keypad: Box<dyn InputDriver + Send>,
}

pub(crate) const ENTER_NEW: &str = "Enter New Pass:";
pub(crate) const REENTER_NEW: &str = "Reenter New Pass";
pub(crate) const SETUP_MISMATCH: &str = "Error Try again";
pub(crate) const SETUP_DONE: &str = "Successful !";
pub(crate) const MENU_OPEN: &str = "- : Open Door";
pub(crate) const MENU_CHANGE: &str = "+ : Change Pass";
pub(crate) const ENTER_PASS: &str = "Enter Pass:";
pub(crate) const ENTER_OLD: &str = "Enter Old Pass:";
pub(crate) const WRONG_PASS: &str = "Wrong Password";
pub(crate) const OPEN_LOCKOUT: &str = "Thief !!!";
pub(crate) const CHANGE_LOCKOUT: &str = "Error !!!";
pub(crate) const DOOR_OPENING: &str = "Door is opening";
pub(crate) const DOOR_OPENED: &str = "Door is opened";
pub(crate) const DOOR_CLOSING: &str = "Door is closing";
pub(crate) const LINK_LOST: &str = "Link lost";

/// Data shared by all states of the front-end state machine.
pub(crate) struct HmiContext {
    pub settings: Settings,
    pub io: HmiPeripherals,
}

impl HmiContext {
    pub fn new(settings: Settings, io: HmiPeripherals) -> Self {
        HmiContext { settings, io }
    }

    /// Replace the screen with one or two lines.
    pub fn show(&mut self, first: &str, second: Option<&str>) {
        self.io.display.clear();
        self.io.display.write(first);
        if let Some(second) = second {
            self.io.display.move_to(1, 0);
            self.io.display.write(second);
        }
    }

    pub fn send<S: WireSymbol>(&mut self, symbol: S) -> Result<(), Error> {
        debug!("tx {:?}", symbol);
        self.io.link.send(symbol.into())?;
        Ok(())
    }

    /// Collect digits until Enter, echoing `*` on the second line.
    ///
    /// Keys other than digits and Enter are ignored, as are digits past
    /// [`MAX_ENTRY_LEN`].
    pub fn collect_entry(&mut self) -> Result<Vec<u8>, Error> {
        let mut digits = Vec::with_capacity(MAX_ENTRY_LEN);
        self.io.display.move_to(1, 0);
        loop {
            match self.io.keypad.read_key()? {
                Key::Enter => return Ok(digits),
                Key::Digit(digit) if digits.len() < MAX_ENTRY_LEN => {
                    digits.push(digit);
                    self.io.display.write("*");
                }
                key => debug!("ignoring key {:?} during entry", key),
            }
        }
    }

    /// Prompt for a credential and forward it as one frame.
    pub fn enter_credential(&mut self, prompt: &str) -> Result<(), Error> {
        self.show(prompt, None);
        let digits = self.collect_entry()?;
        debug!("tx credential frame ({} digits)", digits.len());
        self.io.link.send_all(&encode_entry(&digits))?;
        Ok(())
    }

    /// Wait for the next symbol of type `S`, skipping unrelated bytes.
    ///
    /// A `READY` or `ARMED` in the middle of a session means the back-end has
    /// restarted its protocol, which is reported as [`Error::Reannounced`].
    pub fn await_symbol<S: WireSymbol>(&mut self) -> Result<S, Error> {
        loop {
            let byte = self.io.link.receive(self.settings.read_timeout)?;
            if let Some(symbol) = S::decode(byte) {
                debug!("rx {:?}", symbol);
                return Ok(symbol);
            }
            if matches!(
                LinkControl::decode(byte),
                Some(LinkControl::Ready) | Some(LinkControl::Armed)
            ) {
                return Err(Error::Reannounced);
            }
            warn!("skipping byte {:#04x}", byte);
        }
    }

    /// Ask the back-end where the session stands and wait for the answer,
    /// asking again after every timeout. Returns `true` when the back-end
    /// holds a credential.
    pub fn request_announce(&mut self) -> Result<bool, Error> {
        self.send(LinkControl::Resync)?;
        loop {
            match self.io.link.receive(self.settings.read_timeout) {
                Ok(byte) => match LinkControl::decode(byte) {
                    Some(LinkControl::Ready) => return Ok(false),
                    Some(LinkControl::Armed) => return Ok(true),
                    _ => debug!("dropping byte {:#04x} while resynchronising", byte),
                },
                Err(LinkError::Timeout(_)) => self.send(LinkControl::Resync)?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn await_notice(&mut self, expected: Notice) -> Result<(), Error> {
        loop {
            let notice = self.await_symbol::<Notice>()?;
            if notice == expected {
                return Ok(());
            }
            warn!("skipping {:?} while waiting for {:?}", notice, expected);
        }
    }

    /// The user side of the setup protocol: enter, re-enter, repeat until the
    /// back-end reports both entries as equal.
    pub fn choose_credential(&mut self) -> Result<(), Error> {
        loop {
            self.enter_credential(ENTER_NEW)?;
            self.enter_credential(REENTER_NEW)?;
            match self.await_symbol::<Verdict>()? {
                Verdict::Matched => {
                    self.show(SETUP_DONE, None);
                    return Ok(());
                }
                Verdict::Unmatched => self.show(SETUP_MISMATCH, None),
            }
        }
    }

    /// The user side of the verification protocol. Returns the final verdict
    /// after at most [`MAX_RETRIES`] retries.
    pub fn prove_credential(&mut self, prompt: &str) -> Result<Verdict, Error> {
        self.enter_credential(prompt)?;
        let mut verdict = self.await_symbol::<Verdict>()?;

        let mut retries = 0;
        while !verdict.is_match() && retries < MAX_RETRIES {
            retries += 1;
            self.show(WRONG_PASS, None);
            self.enter_credential(prompt)?;
            verdict = self.await_symbol::<Verdict>()?;
        }
        Ok(verdict)
    }
}
