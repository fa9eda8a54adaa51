use super::*;
use std::sync::Mutex;

/// Replies with a fixed answer, streamed word by word, and remembers prompts
struct ScriptedModel {
    answer: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("prompt lock")
            .last()
            .cloned()
            .expect("model should have been called")
    }
}

impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    fn complete(&self, prompt: &str, sink: Option<&dyn TokenSink>) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("prompt lock")
            .push(prompt.to_string());

        let answer = self.answer.clone().map_err(GenerationError::Model)?;
        if let Some(sink) = sink {
            for word in answer.split_inclusive(' ') {
                sink.on_token(word);
            }
            sink.on_complete();
        }
        Ok(answer)
    }
}

#[derive(Default)]
struct CollectingSink {
    tokens: Mutex<Vec<String>>,
    completed: Mutex<bool>,
}

impl TokenSink for CollectingSink {
    fn on_token(&self, token: &str) {
        self.tokens.lock().expect("token lock").push(token.to_string());
    }

    fn on_complete(&self) {
        *self.completed.lock().expect("complete lock") = true;
    }
}

fn chunks(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| (*t).to_string()).collect()
}

#[test]
fn prompt_contains_context_and_question() {
    let prompt = StuffPrompt::new(1024, 256);
    let rendered = prompt
        .render(
            "What is the capital?",
            &chunks(&["The capital is X.", "Rivers flow north."]),
        )
        .expect("prompt should fit");

    assert!(rendered.text.starts_with(QA_INSTRUCTION));
    assert!(
        rendered
            .text
            .contains("The capital is X.\n\nRivers flow north.")
    );
    assert!(
        rendered
            .text
            .ends_with("Question: What is the capital?\nHelpful Answer:")
    );
    assert_eq!(rendered.chunks_used, 2);
    assert_eq!(rendered.chunks_dropped, 0);
}

#[test]
fn context_keeps_retrieval_order() {
    let prompt = StuffPrompt::new(1024, 256);
    let rendered = prompt
        .render("q", &chunks(&["zeta first", "alpha second"]))
        .expect("prompt should fit");

    let first = rendered.text.find("zeta first").expect("first chunk");
    let second = rendered.text.find("alpha second").expect("second chunk");
    assert!(first < second);
}

#[test]
fn chunks_beyond_budget_are_dropped_from_tail() {
    let long_chunk = "word ".repeat(60);
    let prompt = StuffPrompt::new(300, 100);
    let context = vec![
        "short relevant fact".to_string(),
        long_chunk.clone(),
        long_chunk.clone(),
        long_chunk,
    ];

    let rendered = prompt.render("question?", &context).expect("prompt should fit");

    assert!(rendered.chunks_used >= 1);
    assert!(rendered.chunks_dropped >= 1);
    assert_eq!(rendered.chunks_used + rendered.chunks_dropped, 4);
    assert!(rendered.text.contains("short relevant fact"));
    assert!(rendered.estimated_tokens <= prompt.budget());
}

#[test]
fn bare_template_over_budget_is_an_error() {
    let prompt = StuffPrompt::new(40, 30);
    let result = prompt.render("What does the constitution say?", &[]);

    assert!(matches!(
        result,
        Err(GenerationError::ContextOverflow { budget: 10, .. })
    ));
}

#[test]
fn empty_question_still_renders() {
    let prompt = StuffPrompt::new(1024, 256);
    let rendered = prompt.render("", &chunks(&["ctx"])).expect("prompt should fit");
    assert!(rendered.text.contains("Question: \n"));
}

#[test]
fn generator_returns_model_text() {
    let model = Arc::new(ScriptedModel::answering("The capital is X."));
    let generator = StuffGenerator::new(model.clone(), StuffPrompt::new(1024, 256));

    let answer = generator
        .generate("What is the capital?", &chunks(&["The capital is X."]))
        .expect("generation should succeed");

    assert_eq!(answer, "The capital is X.");
    assert!(model.last_prompt().contains("The capital is X."));
    assert_eq!(generator.model_id(), "scripted");
}

#[test]
fn generator_streams_to_sink() {
    let model = Arc::new(ScriptedModel::answering("one two three"));
    let sink = Arc::new(CollectingSink::default());
    let generator =
        StuffGenerator::new(model, StuffPrompt::new(1024, 256)).with_sink(sink.clone());

    let answer = generator
        .generate("count", &[])
        .expect("generation should succeed");

    let tokens = sink.tokens.lock().expect("token lock").clone();
    assert_eq!(tokens.concat(), answer);
    assert_eq!(tokens.len(), 3);
    assert!(*sink.completed.lock().expect("complete lock"));
}

#[test]
fn generator_propagates_model_failure() {
    let model = Arc::new(ScriptedModel::failing("out of memory"));
    let generator = StuffGenerator::new(model, StuffPrompt::new(1024, 256));

    let result = generator.generate("q", &[]);
    assert!(matches!(result, Err(GenerationError::Model(m)) if m == "out of memory"));
}

#[test]
fn generator_does_not_call_model_on_overflow() {
    let model = Arc::new(ScriptedModel::answering("unused"));
    let generator = StuffGenerator::new(model.clone(), StuffPrompt::new(20, 10));

    let result = generator.generate("a question that is far too long for the budget", &[]);

    assert!(matches!(result, Err(GenerationError::ContextOverflow { .. })));
    assert!(model.prompts.lock().expect("prompt lock").is_empty());
}

#[test]
fn prompt_from_generation_config() {
    let config = crate::config::GenerationConfig::default();
    let prompt = StuffPrompt::from(&config);

    assert_eq!(prompt.context_window, 1024);
    assert_eq!(prompt.max_tokens, 256);
    assert_eq!(prompt.budget(), 768);
}
