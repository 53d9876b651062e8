/// REST + SSE surface of the backend.
pub const CHAT_STREAM_PATH: &str = "/api/chat/stream";
pub const CHAT_PATH: &str = "/api/chat";
pub const AUTH_SIGNUP_PATH: &str = "/api/auth/signup";
pub const AUTH_LOGIN_PATH: &str = "/api/auth/login";
pub const UPLOAD_PATH: &str = "/api/upload_pdf";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Session store keys, shared with the web client.
pub const TOKEN_KEY: &str = "rag_token";
pub const USER_KEY: &str = "rag_user";

/// Upload limits enforced client-side before any network call.
pub const PDF_MIME: &str = "application/pdf";
pub const MAX_PDF_BYTES: u64 = 50 * 1024 * 1024;

/// Stream guards.
pub const MAX_STREAM_FRAMES: usize = 100_000;
pub const MAX_FRAME_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Sources previews are capped server-side at 160 chars; mirror that
/// when rendering anything longer.
pub const PREVIEW_CHARS: usize = 160;
