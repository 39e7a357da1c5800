//! Throwables and stack frames as logging frameworks hand them over

use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::{NATIVE_METHOD_LINE, StackFrame, ThrowableInfo};

/// Deepest throwable kept when converting a cause chain
pub const MAX_THROWABLE_DEPTH: usize = 64;

/// A stack frame in the host runtime's shape
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignFrame {
    pub class_name: String,
    pub method_name: String,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Negative when unknown, `-2` for native methods
    #[serde(default = "unknown_line")]
    pub line_number: i32,
    #[serde(default)]
    pub class_loader_name: Option<String>,
    #[serde(default)]
    pub module_version: Option<String>,
}

fn unknown_line() -> i32 {
    -1
}

impl ForeignFrame {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            line_number: unknown_line(),
            ..Default::default()
        }
    }

    pub fn at(mut self, file_name: impl Into<String>, line_number: i32) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = line_number;
        self
    }
}

/// A throwable in the host runtime's shape
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignThrowable {
    pub class_name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack_trace: Vec<ForeignFrame>,
    /// Frames shared with the enclosing trace and left out of `stack_trace`
    #[serde(default)]
    pub common_frames: u32,
    #[serde(default)]
    pub cause: Option<Box<ForeignThrowable>>,
    #[serde(default)]
    pub suppressed: Vec<ForeignThrowable>,
}

impl ForeignThrowable {
    pub fn new(class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message,
            ..Default::default()
        }
    }

    pub fn caused_by(mut self, cause: ForeignThrowable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub fn convert_frame(frame: &ForeignFrame) -> StackFrame {
    let line_number = match frame.line_number {
        NATIVE_METHOD_LINE => Some(NATIVE_METHOD_LINE),
        line if line < 0 => None,
        line => Some(line),
    };
    StackFrame {
        declaring_class: Some(frame.class_name.clone()),
        method_name: Some(frame.method_name.clone()),
        file_name: frame.file_name.clone(),
        line_number,
        code_location: frame.class_loader_name.clone(),
        version: frame.module_version.clone(),
        exact: false,
    }
}

/// Convert a throwable tree, cutting the cause chain at [`MAX_THROWABLE_DEPTH`]
pub fn convert_throwable(throwable: &ForeignThrowable) -> ThrowableInfo {
    convert_at(throwable, 1)
}

fn convert_at(throwable: &ForeignThrowable, depth: usize) -> ThrowableInfo {
    let mut info = ThrowableInfo {
        name: Some(throwable.class_name.clone()),
        message: throwable.message.clone(),
        stack_trace: Some(throwable.stack_trace.iter().map(convert_frame).collect()),
        omitted_elements: throwable.common_frames,
        cause: None,
        suppressed: None,
    };

    if depth >= MAX_THROWABLE_DEPTH {
        if throwable.cause.is_some() || !throwable.suppressed.is_empty() {
            debug!(
                depth,
                name = %throwable.class_name,
                "Throwable chain cut at maximum depth"
            );
        }
        return info;
    }

    info.cause = throwable
        .cause
        .as_deref()
        .map(|cause| Box::new(convert_at(cause, depth + 1)));
    if !throwable.suppressed.is_empty() {
        info.suppressed = Some(
            throwable
                .suppressed
                .iter()
                .map(|sibling| convert_at(sibling, depth + 1))
                .collect(),
        );
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_line_numbers() {
        let native = ForeignFrame::new("java.lang.Thread", "sleep0").at("Thread.java", -2);
        assert!(convert_frame(&native).is_native_method());

        let unknown = ForeignFrame::new("Gen$$Proxy", "invoke");
        assert_eq!(convert_frame(&unknown).line_number, None);

        let known = ForeignFrame::new("a.B", "c").at("B.java", 10);
        assert_eq!(convert_frame(&known).line_number, Some(10));
    }

    #[test]
    fn test_cause_and_suppressed() {
        let mut outer = ForeignThrowable::new("Outer", Some("boom".into()))
            .caused_by(ForeignThrowable::new("Inner", None));
        outer.common_frames = 4;
        outer.suppressed.push(ForeignThrowable::new("Sibling", None));

        let info = convert_throwable(&outer);
        assert_eq!(info.depth(), 2);
        assert_eq!(info.omitted_elements, 4);
        assert_eq!(info.cause.as_ref().unwrap().name.as_deref(), Some("Inner"));
        assert_eq!(info.suppressed.as_ref().unwrap().len(), 1);
        assert_eq!(info.cause.unwrap().suppressed, None);
    }

    #[test]
    fn test_chain_is_capped() {
        let mut chain = ForeignThrowable::new("Level0", None);
        for i in 1..200 {
            chain = ForeignThrowable::new(format!("Level{}", i), None).caused_by(chain);
        }

        let info = convert_throwable(&chain);
        assert_eq!(info.depth(), MAX_THROWABLE_DEPTH);
        let deepest = info.causes().last().unwrap();
        assert!(deepest.cause.is_none());
        assert!(deepest.suppressed.is_none());
    }
}
