pub mod cookie;
pub mod error;
pub mod model;
pub mod page;
pub mod services;

pub use cookie::{
    BrowserCookie, CookieCategory, CookieFeatures, CookieRecord, CookieSnapshot, CookieViolation,
    ObservedCookie, SameSite, ViolationKind, cookie_key, normalize_domain,
};
pub use error::{AuditError, DefaultErrorHealer, ErrorCategory, ErrorContext, ErrorHealer, HealingAction};
pub use model::{
    BoundingBox, BranchOutcome, ColorDistance, CookieBuckets, Dimensions, ElementsByRole,
    ForcedActionStatus, InteractiveElement, Interaction, Notice, Point, Rect, Role, ScanReport,
    ScanSession, Stage,
};
pub use page::{DOCUMENT_ROOT, ElementState, FrameStatus, NodeInfo, OverlayCandidate, PageDriver};
pub use services::{
    Capability, ClassifierService, CookieClassifier, Notification, Notifier, NoticePicker,
    PickReason, Translation, Translator,
};
