pub mod ollama;
pub mod openai_compatible;

#[cfg(test)]
pub(crate) mod stub;
