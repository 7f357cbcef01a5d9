//! Helper macros for the hardware abstraction modules.

/// Generate debug formatting code for a [`SerialPort`](serialport::SerialPort)
/// held by a link.
macro_rules! debug_fmt_serialport {
    ($name:expr, $port:expr, $f:ident) => {
        $f.debug_struct($name)
            .field("name", &$port.name())
            .field("baud_rate", &$port.baud_rate())
            .field("data_bits", &$port.data_bits())
            .field("stop_bits", &$port.stop_bits())
            .field("parity", &$port.parity())
            .field("flow_control", &$port.flow_control())
    };
}
