use std::time::Duration;

use smb1_transport::NBSS_PORT;

/// Client-side knobs. The defaults match the microSD Management server's
/// expectations; nothing here needs tuning for normal use.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server TCP port.
    pub port: u16,
    /// Bound on every socket read/write. A timeout mid-frame poisons MID
    /// correlation, so the connection is closed rather than resynchronized.
    pub timeout: Duration,
    /// Our own NetBIOS calling name.
    pub client_name: String,
    /// Share name on the server.
    pub share: String,
    /// The buffer size we advertise at session setup.
    pub max_buffer_size: u16,
    /// Entries requested per FIND_FIRST2/FIND_NEXT2 round.
    pub find_batch_size: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: NBSS_PORT,
            timeout: Duration::from_secs(5),
            client_name: "SDMC-RS".to_string(),
            share: "microSD".to_string(),
            max_buffer_size: 0xFFFF,
            find_batch_size: 256,
        }
    }
}
