use http::StatusCode;

use crate::body::ResponseBody;

/// A response as delivered by a connection.
pub type Response = http::Response<ResponseBody>;

/// Status codes that trigger a redirect hop when a `Location` header is present.
pub(crate) fn is_redirect_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
