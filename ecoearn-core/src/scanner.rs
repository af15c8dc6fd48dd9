//! Scanner session: acquire a token, activate the bin, and track what the operator sees.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::activation::{ActivationError, ActivationProtocol};
use crate::model::{BinId, UserId};
use crate::token::{self, TokenError};

#[derive(thiserror::Error, Debug)]
/// Capture device failures.
pub enum CaptureError {
    /// The device could not be opened (missing, busy, or permission denied).
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// Reading from an open device failed.
    #[error("capture failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Grayscale frame grabbed from a camera.
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major 8-bit luminance.
    pub luma: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One sample taken from a capture source.
pub enum Sample {
    /// Raw frame that still needs QR decoding.
    Frame(Frame),
    /// Text already decoded by an external reader.
    Text(String),
}

#[async_trait]
/// Something that yields samples until it is dropped: a camera, a reader process.
pub trait FrameSource: Send {
    /// Next sample, or `None` when the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the device fails.
    async fn next_sample(&mut self) -> Result<Option<Sample>, CaptureError>;
}

/// QR symbol reader for raw frames.
pub trait FrameDecoder: Send + Sync {
    /// Text of the first QR symbol in `frame`, if any.
    fn decode(&self, frame: &Frame) -> Option<String>;
}

/// Decoder for sources that only ever emit [`Sample::Text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrameDecoder;

impl FrameDecoder for NoFrameDecoder {
    fn decode(&self, _frame: &Frame) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why a scan ended in the error state.
pub enum ScanFailure {
    /// Capture device missing or failed.
    CameraUnavailable(String),
    /// Scanned text is not an activation token.
    MalformedToken,
    /// Scanned text is a token of another kind.
    WrongKind,
    /// Token refers to an unknown bin.
    BinNotFound,
    /// Another user holds the bin.
    BinBusy,
    /// The bin changed state while we were writing.
    Conflict,
    /// Operator tried to release a bin someone else holds.
    NotOccupant,
    /// The store could not be read or written.
    Store(String),
    /// No bin was activated in this session.
    NothingToDeactivate,
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFailure::CameraUnavailable(reason) => {
                write!(formatter, "Camera access denied or not available ({reason})")
            }
            ScanFailure::MalformedToken => formatter.write_str("Invalid QR code data"),
            ScanFailure::WrongKind => formatter.write_str("Invalid QR code format"),
            ScanFailure::BinNotFound => formatter.write_str("Bin not found"),
            ScanFailure::BinBusy => {
                formatter.write_str("This bin is already in use by another user")
            }
            ScanFailure::Conflict => formatter.write_str("This bin just became busy, try again"),
            ScanFailure::NotOccupant => {
                formatter.write_str("Only the user holding this bin can deactivate it")
            }
            ScanFailure::Store(reason) => write!(formatter, "Failed to update bin: {reason}"),
            ScanFailure::NothingToDeactivate => formatter.write_str("No bin is active"),
        }
    }
}

impl From<TokenError> for ScanFailure {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(_) => ScanFailure::MalformedToken,
            TokenError::WrongKind(_) => ScanFailure::WrongKind,
        }
    }
}

impl From<ActivationError> for ScanFailure {
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::BinNotFound => ScanFailure::BinNotFound,
            ActivationError::BinBusy { .. } => ScanFailure::BinBusy,
            ActivationError::Conflict => ScanFailure::Conflict,
            ActivationError::NotOccupant { .. } => ScanFailure::NotOccupant,
            ActivationError::Store(store) => ScanFailure::Store(store.to_string()),
        }
    }
}

impl From<CaptureError> for ScanFailure {
    fn from(err: CaptureError) -> Self {
        ScanFailure::CameraUnavailable(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the scanner currently shows.
pub enum ScanStatus {
    /// Waiting for the operator.
    Idle,
    /// Capturing or processing a code.
    Scanning,
    /// A bin was activated.
    Success {
        /// The activated bin.
        bin: BinId,
    },
    /// The last attempt failed.
    Error(ScanFailure),
}

/// Pull samples until one decodes to text.
///
/// Stops sampling as soon as a code is read. Dropping the returned future
/// (for example by aborting its task) stops sampling too.
///
/// # Errors
///
/// Returns [`ScanFailure::CameraUnavailable`] when the source fails or ends
/// before a code was read.
pub async fn acquire_token(
    source: &mut dyn FrameSource,
    decoder: &dyn FrameDecoder,
) -> Result<String, ScanFailure> {
    let mut sampled = 0_u64;
    loop {
        let Some(sample) = source.next_sample().await? else {
            return Err(ScanFailure::CameraUnavailable(format!(
                "stream ended after {sampled} samples"
            )));
        };
        sampled += 1;

        let text = match sample {
            Sample::Frame(frame) => decoder.decode(&frame),
            Sample::Text(text) => Some(text),
        };

        if let Some(text) = text.filter(|text| !text.trim().is_empty()) {
            debug!(sampled, "code read from capture source");
            return Ok(text);
        }
    }
}

/// One operator's scanning session.
#[derive(Debug)]
pub struct ScannerSession {
    activation: Arc<ActivationProtocol>,
    user: UserId,
    status: ScanStatus,
    active_bin: Option<BinId>,
}

impl ScannerSession {
    /// Start an idle session scanning on behalf of `user`.
    #[must_use]
    pub fn new(activation: Arc<ActivationProtocol>, user: UserId) -> Self {
        Self {
            activation,
            user,
            status: ScanStatus::Idle,
            active_bin: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    /// User the session scans for.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Bin activated in this session, which the deactivate action applies to.
    #[must_use]
    pub fn active_bin(&self) -> Option<&BinId> {
        self.active_bin.as_ref()
    }

    /// Enter the scanning state.
    pub fn begin(&mut self) {
        self.status = ScanStatus::Scanning;
    }

    /// Leave the scanning state. The activated bin stays available for deactivation.
    pub fn stop(&mut self) {
        self.status = ScanStatus::Idle;
    }

    /// Record a capture failure reported by a front end running [`acquire_token`] itself.
    pub fn fail(&mut self, failure: ScanFailure) {
        warn!(user = %self.user, %failure, "scan failed");
        self.status = ScanStatus::Error(failure);
    }

    /// Decode `raw` and activate the bin it names.
    pub async fn submit(&mut self, raw: &str) -> &ScanStatus {
        self.status = ScanStatus::Scanning;
        match self.activate_from(raw).await {
            Ok(bin) => {
                info!(user = %self.user, %bin, "scan activated bin");
                self.active_bin = Some(bin.clone());
                self.status = ScanStatus::Success { bin };
            }
            Err(failure) => self.fail(failure),
        }
        &self.status
    }

    /// Capture from `source` until a code is read, then [`submit`](Self::submit) it.
    pub async fn scan_live(
        &mut self,
        source: &mut dyn FrameSource,
        decoder: &dyn FrameDecoder,
    ) -> &ScanStatus {
        self.begin();
        match acquire_token(source, decoder).await {
            Ok(text) => self.submit(&text).await,
            Err(failure) => {
                self.fail(failure);
                &self.status
            }
        }
    }

    /// Release the bin activated in this session.
    ///
    /// # Errors
    ///
    /// Returns [`ScanFailure::NothingToDeactivate`] when no bin is active, or
    /// the mapped protocol error. The status is left unchanged on error.
    pub async fn deactivate(&mut self) -> Result<BinId, ScanFailure> {
        let bin = self
            .active_bin
            .clone()
            .ok_or(ScanFailure::NothingToDeactivate)?;
        self.activation.deactivate(&bin, &self.user).await?;
        info!(user = %self.user, %bin, "scan session released bin");
        self.active_bin = None;
        self.status = ScanStatus::Idle;
        Ok(bin)
    }

    async fn activate_from(&self, raw: &str) -> Result<BinId, ScanFailure> {
        let token = token::decode(raw)?;
        self.activation.activate(&token.bin_id, &self.user).await?;
        Ok(token.bin_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::activation::DeactivationPolicy;
    use crate::memory::MemoryStore;
    use crate::model::{Bin, FillLevel, Occupancy};
    use crate::ports::{BinStore, OccupancyLog};

    struct Scripted {
        samples: VecDeque<Result<Sample, CaptureError>>,
        pulled: usize,
    }

    impl Scripted {
        fn new(samples: Vec<Result<Sample, CaptureError>>) -> Self {
            Self {
                samples: samples.into(),
                pulled: 0,
            }
        }
    }

    #[async_trait]
    impl FrameSource for Scripted {
        async fn next_sample(&mut self) -> Result<Option<Sample>, CaptureError> {
            self.pulled += 1;
            self.samples.pop_front().transpose()
        }
    }

    /// Treats a frame as containing a code when its pixels spell out UTF-8 text.
    struct LumaAsText;

    impl FrameDecoder for LumaAsText {
        fn decode(&self, frame: &Frame) -> Option<String> {
            String::from_utf8(frame.luma.clone()).ok()
        }
    }

    fn blank_frame() -> Sample {
        Sample::Frame(Frame {
            width: 2,
            height: 1,
            luma: vec![0xff, 0xfe],
        })
    }

    async fn session(user: &str) -> (Arc<MemoryStore>, ScannerSession) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&Bin {
                id: BinId::from("B1"),
                name: String::from("Plaza"),
                location: None,
                level: FillLevel::EMPTY,
                occupancy: Occupancy::Inactive,
                image: None,
                qr_data: None,
            })
            .await
            .expect("insert");
        let bin_port: Arc<dyn BinStore> = Arc::<MemoryStore>::clone(&store);
        let log_port: Arc<dyn OccupancyLog> = Arc::<MemoryStore>::clone(&store);
        let protocol = Arc::new(ActivationProtocol::new(
            bin_port,
            log_port,
            DeactivationPolicy::default(),
        ));
        (store, ScannerSession::new(protocol, UserId::from(user)))
    }

    fn payload(bin: &str) -> String {
        token::encode(&BinId::from(bin)).to_payload()
    }

    #[tokio::test]
    async fn manual_entry_activates_and_enables_deactivate() {
        let (store, mut scanner) = session("U1").await;
        assert_eq!(scanner.status(), &ScanStatus::Idle, "starts idle");

        let status = scanner.submit(&payload("B1")).await.clone();

        assert_eq!(status, ScanStatus::Success { bin: BinId::from("B1") }, "bin activated");
        assert_eq!(scanner.active_bin(), Some(&BinId::from("B1")), "deactivate available");

        let released = scanner.deactivate().await.expect("release");
        assert_eq!(released, BinId::from("B1"), "released the session bin");
        assert_eq!(scanner.status(), &ScanStatus::Idle, "back to idle");
        let bin = store.get(&BinId::from("B1")).await.expect("get").expect("bin");
        assert_eq!(bin.occupancy, Occupancy::Inactive, "bin freed");
    }

    #[tokio::test]
    async fn errors_map_to_operator_messages() {
        let (_store, mut scanner) = session("U1").await;

        scanner.submit("not a code").await;
        assert_eq!(scanner.status(), &ScanStatus::Error(ScanFailure::MalformedToken), "junk");

        scanner
            .submit(r#"{"binId":"B1","type":"coupon","timestamp":"2024-01-01T00:00:00Z"}"#)
            .await;
        assert_eq!(scanner.status(), &ScanStatus::Error(ScanFailure::WrongKind), "kind");

        scanner.submit(&payload("missing")).await;
        assert_eq!(scanner.status(), &ScanStatus::Error(ScanFailure::BinNotFound), "bin");
        assert_eq!(
            ScanFailure::BinBusy.to_string(),
            "This bin is already in use by another user",
            "busy message"
        );
    }

    #[tokio::test]
    async fn second_user_sees_busy() {
        let (store, mut first) = session("U1").await;
        first.submit(&payload("B1")).await;

        let bin_port: Arc<dyn BinStore> = Arc::<MemoryStore>::clone(&store);
        let log_port: Arc<dyn OccupancyLog> = Arc::<MemoryStore>::clone(&store);
        let protocol = Arc::new(ActivationProtocol::new(
            bin_port,
            log_port,
            DeactivationPolicy::default(),
        ));
        let mut second = ScannerSession::new(protocol, UserId::from("U2"));
        second.submit(&payload("B1")).await;

        assert_eq!(second.status(), &ScanStatus::Error(ScanFailure::BinBusy), "U2 refused");
        assert_eq!(second.active_bin(), None, "nothing to deactivate for U2");
    }

    #[tokio::test]
    async fn live_capture_stops_at_first_decodable_frame() {
        let (_store, mut scanner) = session("U1").await;
        let mut source = Scripted::new(vec![
            Ok(blank_frame()),
            Ok(blank_frame()),
            Ok(Sample::Frame(Frame {
                width: 1,
                height: 1,
                luma: payload("B1").into_bytes(),
            })),
            Ok(Sample::Text(String::from("never read"))),
        ]);

        scanner.scan_live(&mut source, &LumaAsText).await;

        assert_eq!(
            scanner.status(),
            &ScanStatus::Success { bin: BinId::from("B1") },
            "code in third frame activates"
        );
        assert_eq!(source.pulled, 3, "sampling stopped after the hit");
    }

    #[tokio::test]
    async fn capture_failure_is_camera_unavailable() {
        let (_store, mut scanner) = session("U1").await;

        let mut broken = Scripted::new(vec![Err(CaptureError::Unavailable(String::from(
            "permission denied",
        )))]);
        scanner.scan_live(&mut broken, &NoFrameDecoder).await;
        assert!(
            matches!(scanner.status(), ScanStatus::Error(ScanFailure::CameraUnavailable(_))),
            "device error"
        );

        let mut ended = Scripted::new(vec![Ok(blank_frame())]);
        scanner.scan_live(&mut ended, &NoFrameDecoder).await;
        assert!(
            matches!(scanner.status(), ScanStatus::Error(ScanFailure::CameraUnavailable(_))),
            "stream end"
        );
    }

    #[tokio::test]
    async fn deactivate_without_activation_is_refused() {
        let (_store, mut scanner) = session("U1").await;
        assert_eq!(
            scanner.deactivate().await,
            Err(ScanFailure::NothingToDeactivate),
            "no bin held"
        );
    }

    #[tokio::test]
    async fn stop_keeps_activated_bin() {
        let (_store, mut scanner) = session("U1").await;
        scanner.submit(&payload("B1")).await;
        scanner.stop();
        assert_eq!(scanner.status(), &ScanStatus::Idle, "idle after stop");
        assert!(scanner.active_bin().is_some(), "bin still releasable");
    }
}
