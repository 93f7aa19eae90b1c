//! Разбиение текста на фрагменты для синтеза
//!
//! Длинный документ нельзя отправить провайдеру одним запросом, поэтому
//! текст режется по границам предложений и жадно упаковывается во
//! фрагменты не длиннее заданного предела. Предложение длиннее предела
//! остаётся целым отдельным фрагментом: резать посреди предложения нельзя.

use once_cell::sync::Lazy;
use regex::Regex;

/// Конец предложения: серия `.`, `!`, `?`, за которой пробел или конец текста
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(\s|$)").expect("valid sentence regex"));

/// Длина строки в символах (не в байтах)
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Разбить текст на предложения.
///
/// Пробелы после знака препинания относятся к следующему предложению,
/// поэтому конкатенация результата в точности равна исходному тексту.
/// Хвост без завершающего знака становится последним предложением.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        sentences.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        let rest = &text[start..];
        match sentences.last_mut() {
            // Хвостовые пробелы приклеиваем к последнему предложению
            Some(last) if rest.trim().is_empty() => *last = &text[start - last.len()..],
            _ => sentences.push(rest),
        }
    }

    sentences
}

/// Разбить текст на фрагменты длиной не более `max_chars` символов.
///
/// Один и тот же вход всегда даёт одну и ту же последовательность.
/// Пустой текст (или только пробелы) даёт пустую последовательность.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = char_len(sentence);
        if current_len + len <= max_chars {
            current.push_str(sentence);
            current_len += len;
        } else {
            push_trimmed(&mut chunks, &current);
            current = sentence.to_string();
            current_len = len;
        }
    }
    push_trimmed(&mut chunks, &current);

    log::debug!(
        "Split {} chars into {} chunks (max {} chars)",
        char_len(text),
        chunks.len(),
        max_chars
    );
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
