pub(crate) mod lifecycle;
pub(crate) mod settlement;
