//! Тесты конвейера целиком
//!
//! Используют тестовые реализации синтеза, конвертации и хранилища,
//! которые записывают вызовы.

mod test_generate;
