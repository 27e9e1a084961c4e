use structlearn::task::{SequenceInput, SequenceModel, SequenceOutput, Viterbi};
use structlearn::train::{LearnRateSchedule, Trainer};
use structlearn::{FeatureEncoding, Inference, MapEncoding, Structure};

fn encode(
    attributes: &mut MapEncoding<String>,
    labels: &mut MapEncoding<String>,
    sentence: &[(&str, &str)],
) -> (SequenceInput, SequenceOutput) {
    let mut tokens: Vec<Vec<u32>> = Vec::with_capacity(sentence.len());
    let mut tags = Vec::with_capacity(sentence.len());
    for (i, &(word, tag)) in sentence.iter().enumerate() {
        let mut attrs = vec![format!("w={}", word), format!("suffix={}", suffix(word))];
        if i == 0 {
            attrs.push("first".to_string());
        } else {
            attrs.push(format!("prev={}", sentence[i - 1].0));
        }
        tokens.push(attrs.into_iter().filter_map(|a| attributes.put(a)).collect());
        tags.push(labels.put(tag.to_string()));
    }
    (SequenceInput::new(tokens), SequenceOutput::partial(tags))
}

fn suffix(word: &str) -> &str {
    let start = word.char_indices().rev().nth(1).map_or(0, |(i, _)| i);
    &word[start..]
}

/// Fraction of annotated tokens the model labels correctly.
fn accuracy(
    model: &SequenceModel,
    inputs: &[SequenceInput],
    outputs: &[SequenceOutput],
) -> structlearn::Result<f64> {
    let mut correct = 0;
    let mut total = 0;
    for (input, expected) in inputs.iter().zip(outputs) {
        let mut predicted = expected.create_new();
        Viterbi::new().inference(model, input, &mut predicted)?;
        for (got, want) in predicted.labels().iter().zip(expected.labels()) {
            if want.is_some() {
                total += 1;
                if got == want {
                    correct += 1;
                }
            }
        }
    }
    Ok(if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Sequence Labeling Example");
    println!("=========================\n");

    let corpus: Vec<Vec<(&str, &str)>> = vec![
        vec![("the", "DET"), ("dog", "NOUN"), ("barks", "VERB")],
        vec![("a", "DET"), ("cat", "NOUN"), ("sleeps", "VERB")],
        vec![("the", "DET"), ("cat", "NOUN"), ("runs", "VERB"), ("home", "NOUN")],
        vec![("dogs", "NOUN"), ("bark", "VERB")],
        vec![("a", "DET"), ("dog", "NOUN"), ("sees", "VERB"), ("the", "DET"), ("cat", "NOUN")],
    ];

    let mut attributes = MapEncoding::new();
    let mut labels = MapEncoding::new();
    let (inputs, outputs): (Vec<_>, Vec<_>) = corpus
        .iter()
        .map(|sentence| encode(&mut attributes, &mut labels, sentence))
        .unzip();

    println!("Training data:");
    println!("  Sentences: {}", inputs.len());
    println!("  Attributes: {}", attributes.len());
    println!("  Labels: {}\n", labels.len());

    let num_labels = labels.len() as u32;
    let mut models = Vec::new();

    let mut trainer = Trainer::perceptron(SequenceModel::new(num_labels), Viterbi::new())
        .with_num_epochs(10)?
        .with_schedule(LearnRateSchedule::SquareRoot)
        .with_shuffle_seed(Some(42));
    println!("Parameters:");
    for name in ["num_epochs", "learning_rate", "schedule", "shuffle_seed"] {
        println!("  {}: {}", name, trainer.get(name)?);
    }
    println!("\nTraining perceptron...");
    trainer.train(&inputs, &outputs)?;
    models.push(("perceptron", trainer.into_model()));

    println!("Training away-from-worse perceptron...");
    let mut trainer = Trainer::away_from_worse(SequenceModel::new(num_labels), Viterbi::new())
        .with_num_epochs(10)?
        .with_shuffle_seed(Some(42));
    trainer.train(&inputs, &outputs)?;
    models.push(("away_from_worse", trainer.into_model()));

    println!("Training toward-better perceptron...");
    let mut trainer = Trainer::toward_better(SequenceModel::new(num_labels), Viterbi::new())
        .with_num_epochs(10)?
        .with_loss_weight(0.5)?
        .with_shuffle_seed(Some(42));
    trainer.train(&inputs, &outputs)?;
    models.push(("toward_better", trainer.into_model()));

    // Unseen words get no attribute code
    attributes.set_read_only(true);
    labels.set_read_only(true);
    let test = [("the", "DET"), ("dog", "NOUN"), ("sleeps", "VERB")];
    let (test_input, test_output) = encode(&mut attributes, &mut labels, &test);

    println!("\nResults:");
    for (name, model) in &models {
        let train_accuracy = accuracy(model, &inputs, &outputs)?;
        let mut predicted = test_output.create_new();
        Viterbi::new().inference(model, &test_input, &mut predicted)?;
        let tags: Vec<&str> = (0..test.len())
            .map(|t| {
                predicted
                    .label(t)
                    .and_then(|code| labels.value(code))
                    .map_or("?", String::as_str)
            })
            .collect();
        println!(
            "  {:<16} train accuracy {:.3}  \"{}\" -> {:?}",
            name,
            train_accuracy,
            test.iter().map(|&(w, _)| w).collect::<Vec<_>>().join(" "),
            tags
        );
    }

    Ok(())
}
