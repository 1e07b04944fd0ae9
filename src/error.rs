//! Errors returned by the codec, the expression compiler and the request layer.

use crate::{attribute::Shape, retry};

use aws_sdk_dynamodb::{
    config::http::HttpResponse,
    error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation, types,
};
use std::{collections, error, fmt};
use thiserror::Error as ThisError;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn error::Error + Send + Sync>;

/// One step of an [`AttributePath`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    /// A map key or record field.
    Attribute(String),
    /// A list or set position.
    Index(usize),
}

/// Trail of attribute names leading to the value that failed to encode or decode.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributePath(Vec<PathSegment>);

impl AttributePath {
    /// The segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Whether the error happened at the top level.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push_front(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }
}

// renders as ` Foo.Bar[2]`, or nothing for the root, so it can sit right after a word
impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Attribute(name) if position == 0 => write!(f, " {name}")?,
                PathSegment::Attribute(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) if position == 0 => write!(f, " [{index}]")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Error type of the crate.
///
/// Kind predicates ([`is_not_found`], [`is_condition_check_failed`],
/// [`is_retryable`]) also work when the error is wrapped by other error types.
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// A value could not be encoded into an attribute value.
    #[error("dynamo: marshal{path}: {message}")]
    Marshal {
        /// Where the failure happened.
        path: AttributePath,
        /// What went wrong.
        message: String,
    },
    /// An attribute value could not be decoded into the destination.
    #[error("dynamo: unmarshal{path}: {message}")]
    Unmarshal {
        /// Where the failure happened.
        path: AttributePath,
        /// What went wrong.
        message: String,
    },
    /// An expression fragment could not be compiled.
    #[error("dynamo: expression: {0}")]
    Expression(String),
    /// A user supplied marshaler or unmarshaler failed.
    #[error("dynamo: custom codec{path}: {source}")]
    Custom {
        /// Where the failure happened.
        path: AttributePath,
        /// The error raised by the custom code, untouched.
        #[source]
        source: BoxError,
    },
    /// The `serde_dynamo` bypass codec failed.
    #[error("dynamo: serde{path}: {source}")]
    Serde {
        /// Where the failure happened.
        path: AttributePath,
        /// The underlying serde error.
        #[source]
        source: serde_dynamo::Error,
    },
    /// A single-item read found no item.
    #[error("dynamo: item not found")]
    NotFound,
    /// A write condition or transaction condition check evaluated to false.
    #[error("dynamo: condition check failed")]
    ConditionCheckFailed {
        /// The current items, when the request asked for them.
        items: Vec<collections::HashMap<String, types::AttributeValue>>,
        /// The service error this was built from.
        #[source]
        source: Option<BoxError>,
    },
    /// The service or the transport failed.
    #[error("dynamo: {message}")]
    Service {
        /// The service error code, if any.
        code: Option<String>,
        /// HTTP status of the response, when one was received.
        status: Option<u16>,
        /// Rendered error chain.
        message: String,
        /// Whether retrying may succeed.
        retryable: bool,
        /// The SDK error.
        #[source]
        source: BoxError,
    },
    /// The SDK refused to build a request.
    #[error("dynamo: invalid request: {0}")]
    Request(#[from] BuildError),
    /// A batch request left work unprocessed and the retry policy gave up.
    #[error("dynamo: {count} batch requests left unprocessed")]
    Unprocessed {
        /// How many keys or writes were left.
        count: usize,
    },
    /// An iteration was cancelled by its caller.
    #[error("dynamo: iteration cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn marshal(message: impl Into<String>) -> Self {
        Self::Marshal {
            path: AttributePath::default(),
            message: message.into(),
        }
    }

    pub(crate) fn unmarshal(message: impl Into<String>) -> Self {
        Self::Unmarshal {
            path: AttributePath::default(),
            message: message.into(),
        }
    }

    pub(crate) fn cannot_marshal<T: ?Sized>(what: &str) -> Self {
        Self::marshal(format!(
            "cannot marshal {} as {what}",
            std::any::type_name::<T>()
        ))
    }

    pub(crate) fn cannot_unmarshal<T: ?Sized>(value: &types::AttributeValue) -> Self {
        let shape = Shape::of(value).map_or("unknown shape", Shape::as_str);
        Self::unmarshal(format!(
            "cannot unmarshal {shape} into {}",
            std::any::type_name::<T>()
        ))
    }

    pub(crate) fn expression(message: impl Into<String>) -> Self {
        Self::Expression(message.into())
    }

    /// Wraps an error raised by a custom marshaler; the cause is kept as-is.
    pub fn custom(source: impl Into<BoxError>) -> Self {
        Self::Custom {
            path: AttributePath::default(),
            source: source.into(),
        }
    }

    pub(crate) fn serde(source: serde_dynamo::Error) -> Self {
        Self::Serde {
            path: AttributePath::default(),
            source,
        }
    }

    /// Prefixes the attribute path with a field or map key name.
    pub(crate) fn in_attribute(self, name: &str) -> Self {
        self.with_segment(PathSegment::Attribute(name.to_string()))
    }

    /// Prefixes the attribute path with a list position.
    pub(crate) fn at_index(self, index: usize) -> Self {
        self.with_segment(PathSegment::Index(index))
    }

    fn with_segment(mut self, segment: PathSegment) -> Self {
        match &mut self {
            Self::Marshal { path, .. }
            | Self::Unmarshal { path, .. }
            | Self::Custom { path, .. }
            | Self::Serde { path, .. } => path.push_front(segment),
            _ => {}
        }
        self
    }

    /// The attribute path of a codec error.
    pub fn path(&self) -> Option<&AttributePath> {
        match self {
            Self::Marshal { path, .. }
            | Self::Unmarshal { path, .. }
            | Self::Custom { path, .. }
            | Self::Serde { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The service error code, if this error came from the service.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            Self::ConditionCheckFailed { .. } => Some("ConditionalCheckFailedException"),
            _ => None,
        }
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => *status,
            _ => None,
        }
    }

    /// Items attached to a condition check failure.
    pub fn condition_items(&self) -> &[collections::HashMap<String, types::AttributeValue>] {
        match self {
            Self::ConditionCheckFailed { items, .. } => items,
            _ => &[],
        }
    }

    /// Whether this is [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether this is [`Error::ConditionCheckFailed`].
    pub fn is_condition_check_failed(&self) -> bool {
        matches!(self, Self::ConditionCheckFailed { .. })
    }

    /// Whether the failed request may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Service {
                retryable: true,
                ..
            } | Self::Unprocessed { .. }
        )
    }
}

fn find(err: &(dyn error::Error + 'static), predicate: fn(&Error) -> bool) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(err) = err.downcast_ref::<Error>() {
            if predicate(err) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

/// Whether `err`, or anything it wraps, is [`Error::NotFound`].
pub fn is_not_found(err: &(dyn error::Error + 'static)) -> bool {
    find(err, Error::is_not_found)
}

/// Whether `err`, or anything it wraps, is [`Error::ConditionCheckFailed`].
pub fn is_condition_check_failed(err: &(dyn error::Error + 'static)) -> bool {
    find(err, Error::is_condition_check_failed)
}

/// Whether `err`, or anything it wraps, is a retryable service error.
pub fn is_retryable(err: &(dyn error::Error + 'static)) -> bool {
    find(err, Error::is_retryable)
}

/// Operation errors that may carry condition check failure details.
pub(crate) trait OperationError: ProvideErrorMetadata + error::Error + Send + Sync {
    /// `Some(items)` when the operation failed on a condition check.
    fn condition_failure(&self) -> Option<Vec<collections::HashMap<String, types::AttributeValue>>> {
        None
    }

    /// Whether the error is retryable beyond what its code says.
    fn retryable(&self) -> bool {
        self.code().is_some_and(retry::is_retryable_code)
    }
}

macro_rules! operation_error {
    ($($error:ty),* $(,)?) => {
        $(impl OperationError for $error {})*
    };
}

macro_rules! conditional_operation_error {
    ($($error:ident),* $(,)?) => {
        $(
            impl OperationError for $error {
                fn condition_failure(
                    &self,
                ) -> Option<Vec<collections::HashMap<String, types::AttributeValue>>> {
                    match self {
                        Self::ConditionalCheckFailedException(err) => {
                            Some(err.item().cloned().into_iter().collect())
                        }
                        _ => None,
                    }
                }
            }
        )*
    };
}

use operation::{
    delete_item::DeleteItemError, put_item::PutItemError, update_item::UpdateItemError,
};

conditional_operation_error!(DeleteItemError, PutItemError, UpdateItemError);

operation_error!(
    operation::batch_get_item::BatchGetItemError,
    operation::batch_write_item::BatchWriteItemError,
    operation::create_table::CreateTableError,
    operation::delete_table::DeleteTableError,
    operation::describe_table::DescribeTableError,
    operation::get_item::GetItemError,
    operation::list_tables::ListTablesError,
    operation::query::QueryError,
    operation::scan::ScanError,
);

fn cancellation_failure(
    reasons: Option<&Vec<types::CancellationReason>>,
) -> Option<Vec<collections::HashMap<String, types::AttributeValue>>> {
    let reasons = reasons?;
    let failed = reasons
        .iter()
        .any(|reason| reason.code.as_deref() == Some("ConditionalCheckFailed"));
    if !failed {
        return None;
    }
    let items = reasons
        .iter()
        .filter_map(|reason| reason.item.clone())
        .collect();
    Some(items)
}

fn cancellation_retryable(reasons: Option<&Vec<types::CancellationReason>>) -> bool {
    let Some(reasons) = reasons else {
        return false;
    };
    let mut retryable = false;
    for reason in reasons {
        match reason.code.as_deref() {
            None | Some("None") => {}
            Some(code) if retry::is_retryable_cancellation(code) => retryable = true,
            Some(_) => return false,
        }
    }
    retryable
}

impl OperationError for operation::transact_write_items::TransactWriteItemsError {
    fn condition_failure(&self) -> Option<Vec<collections::HashMap<String, types::AttributeValue>>> {
        match self {
            Self::TransactionCanceledException(err) => {
                cancellation_failure(err.cancellation_reasons.as_ref())
            }
            _ => None,
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::TransactionCanceledException(err) => {
                cancellation_retryable(err.cancellation_reasons.as_ref())
            }
            _ => self.code().is_some_and(retry::is_retryable_code),
        }
    }
}

impl OperationError for operation::transact_get_items::TransactGetItemsError {
    fn retryable(&self) -> bool {
        match self {
            Self::TransactionCanceledException(err) => {
                cancellation_retryable(err.cancellation_reasons.as_ref())
            }
            _ => self.code().is_some_and(retry::is_retryable_code),
        }
    }
}

/// Timeouts and I/O failures of the transport.
fn transport_retryable<E, R>(err: &SdkError<E, R>) -> bool {
    match err {
        SdkError::TimeoutError(_) => true,
        SdkError::DispatchFailure(failure) => failure.is_io() || failure.is_timeout(),
        _ => false,
    }
}

impl<E> From<SdkError<E, HttpResponse>> for Error
where
    E: OperationError + 'static,
{
    fn from(err: SdkError<E, HttpResponse>) -> Self {
        let message = DisplayErrorContext(&err).to_string();
        let status = err.raw_response().map(|response| response.status().as_u16());
        let status_retryable = status.is_some_and(retry::is_retryable_status);
        let (condition_items, retryable) = match err.as_service_error() {
            Some(service_error) => (
                service_error.condition_failure(),
                service_error.retryable() || status_retryable,
            ),
            None => (None, transport_retryable(&err) || status_retryable),
        };
        if let Some(items) = condition_items {
            return Self::ConditionCheckFailed {
                items,
                source: Some(Box::new(err)),
            };
        }
        Self::Service {
            code: err.code().map(str::to_string),
            status,
            message,
            retryable,
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_dynamodb::{error::ErrorMetadata, operation::get_item::GetItemError};
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use rstest::rstest;

    fn response(status: u16) -> HttpResponse {
        HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::empty())
    }

    fn get_item_error(code: &str, status: u16) -> Error {
        let metadata = ErrorMetadata::builder().code(code).message("failed").build();
        SdkError::service_error(GetItemError::generic(metadata), response(status)).into()
    }

    #[derive(Debug, ThisError)]
    #[error("wrapped: {0}")]
    struct Wrapper(#[source] Error);

    #[rstest]
    #[case::root(Error::marshal("boom"), "dynamo: marshal: boom")]
    #[case::attribute(
        Error::unmarshal("cannot unmarshal S into i64").in_attribute("Count"),
        "dynamo: unmarshal Count: cannot unmarshal S into i64"
    )]
    #[case::nested(
        Error::unmarshal("bad").in_attribute("Bar").at_index(2).in_attribute("Foo"),
        "dynamo: unmarshal Foo[2].Bar: bad"
    )]
    #[case::not_found(Error::NotFound, "dynamo: item not found")]
    fn test_display(#[case] err: Error, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_path_segments() {
        let err = Error::marshal("bad").at_index(1).in_attribute("List");
        let path = err.path().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Attribute("List".to_string()),
                PathSegment::Index(1),
            ]
        );
    }

    #[test]
    fn test_predicates_through_wrapping() {
        let wrapped = Wrapper(Error::NotFound);
        assert!(is_not_found(&wrapped));
        assert!(!is_condition_check_failed(&wrapped));

        let wrapped = Wrapper(Error::ConditionCheckFailed {
            items: Vec::new(),
            source: None,
        });
        assert!(is_condition_check_failed(&wrapped));
        assert!(!is_retryable(&wrapped));
    }

    #[rstest]
    #[case::internal_failure_503("InternalFailure", 503, true)]
    #[case::unknown_code_500("SomethingBroke", 500, true)]
    #[case::throttled_400("ThrottlingException", 400, true)]
    #[case::validation_400("ValidationException", 400, false)]
    #[case::unknown_code_502("SomethingBroke", 502, false)]
    fn test_service_error_retryable(
        #[case] code: &str,
        #[case] status: u16,
        #[case] retryable: bool,
    ) {
        let err = get_item_error(code, status);
        assert_eq!(err.code(), Some(code));
        assert_eq!(err.status(), Some(status));
        assert_eq!(err.is_retryable(), retryable);
    }

    #[rstest]
    #[case::internal_error(500, true)]
    #[case::unavailable(503, true)]
    #[case::bad_request(400, false)]
    fn test_response_error_retryable(#[case] status: u16, #[case] retryable: bool) {
        let err: Error =
            SdkError::<GetItemError, _>::response_error("unparseable body", response(status))
                .into();
        assert_eq!(err.code(), None);
        assert_eq!(err.status(), Some(status));
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn test_timeout_is_retryable_without_status() {
        let err: Error = SdkError::<GetItemError, HttpResponse>::timeout_error("too slow").into();
        assert_eq!(err.status(), None);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_custom_keeps_source() {
        let err = Error::custom(std::io::Error::other("disk on fire"));
        let source = error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk on fire");
    }

    #[test]
    fn test_cancellation_failure_collects_items() {
        let item = collections::HashMap::from([(
            "ID".to_string(),
            types::AttributeValue::N("1".to_string()),
        )]);
        let reasons = vec![
            types::CancellationReason::builder().code("None").build(),
            types::CancellationReason::builder()
                .code("ConditionalCheckFailed")
                .set_item(Some(item.clone()))
                .build(),
        ];
        assert_eq!(cancellation_failure(Some(&reasons)), Some(vec![item]));
        assert!(!cancellation_retryable(Some(&reasons)));
    }

    #[test]
    fn test_cancellation_retryable_on_conflict() {
        let reasons = vec![
            types::CancellationReason::builder().code("None").build(),
            types::CancellationReason::builder()
                .code("TransactionConflict")
                .build(),
        ];
        assert!(cancellation_retryable(Some(&reasons)));
        assert_eq!(cancellation_failure(Some(&reasons)), None);
    }
}
