use spimi_core::tokenizer::Tokenizer;

#[test]
fn it_normalizes_and_stems() {
    let toks = Tokenizer::new().tokenize("Running Runners RUN! The ＲＵＳＴ menu.");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // NFKC folds full-width letters
    assert!(words.contains(&"rust".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let toks = Tokenizer::new().tokenize("The quick brown fox and the lazy dog");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn it_reads_a_stopwords_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stop.txt");
    std::fs::write(&path, "# custom list\nquick\n\nlazy\n").unwrap();
    let tok = Tokenizer::from_stopwords_file(&path).unwrap();
    let words: Vec<String> = tok.tokenize("The quick lazy dog").into_iter().map(|(w, _)| w).collect();
    assert_eq!(words, vec!["the", "dog"]);
}
