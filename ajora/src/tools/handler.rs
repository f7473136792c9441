use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolHandlerError;
use crate::message::ToolCall;

/// Executes a frontend tool.
///
/// Called by the run handler with the parsed arguments (an empty object when the model sent
/// no arguments) and the originating [`ToolCall`]. The returned value is stringified into the
/// tool-result message: strings verbatim, other values as JSON, `null` as an empty string.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use ajora::message::ToolCall;
/// use ajora::tools::ToolHandler;
/// use ajora::ToolHandlerError;
///
/// struct Weather;
///
/// #[async_trait]
/// impl ToolHandler for Weather {
///     async fn call(&self, args: Value, _tool_call: &ToolCall) -> Result<Value, ToolHandlerError> {
///         let city = args["city"].as_str().ok_or("missing city")?;
///         Ok(json!({"city": city, "temp_c": 21}))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value, tool_call: &ToolCall) -> Result<Value, ToolHandlerError>;
}

/// Adapts an async closure into a [`ToolHandler`]. Built by [`handler_fn`].
pub struct FnToolHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value, ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolHandlerError>> + Send,
{
    async fn call(&self, args: Value, tool_call: &ToolCall) -> Result<Value, ToolHandlerError> {
        (self.f)(args, tool_call.clone()).await
    }
}

/// Wraps `f` as a shared handler.
///
/// ```
/// use ajora::tools::handler_fn;
/// use serde_json::json;
///
/// let handler = handler_fn(|args, _call| async move { Ok(json!({"echo": args})) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, ToolCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolHandlerError>> + Send + 'static,
{
    Arc::new(FnToolHandler { f })
}
