//! Runnable demos for `docchat-rag`. See the `[[example]]` targets.
