use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use structlearn::task::{SequenceInput, SequenceModel, SequenceOutput, Viterbi};
use structlearn::train::Trainer;

/// Random sequences whose labels follow the first attribute of each token.
fn synthetic_data(
    num_sequences: usize,
    num_labels: u32,
    num_attributes: u32,
) -> (Vec<SequenceInput>, Vec<SequenceOutput>) {
    let mut rng = StdRng::seed_from_u64(0);
    let mut inputs = Vec::with_capacity(num_sequences);
    let mut outputs = Vec::with_capacity(num_sequences);
    for _ in 0..num_sequences {
        let len = rng.gen_range(5..20);
        let mut tokens = Vec::with_capacity(len);
        let mut labels = Vec::with_capacity(len);
        for _ in 0..len {
            let head = rng.gen_range(0..num_attributes);
            let noise = rng.gen_range(0..num_attributes);
            tokens.push(vec![head, noise]);
            labels.push(head % num_labels);
        }
        inputs.push(SequenceInput::new(tokens));
        outputs.push(SequenceOutput::new(labels));
    }
    (inputs, outputs)
}

fn benchmark_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_epoch");
    group.sample_size(20);

    let (inputs, outputs) = synthetic_data(200, 5, 100);
    for name in ["perceptron", "away_from_worse", "toward_better"] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &name, |b, &name| {
            b.iter(|| {
                let model = SequenceModel::new(5);
                let model = match name {
                    "perceptron" => {
                        let mut trainer = Trainer::perceptron(model, Viterbi::new());
                        trainer.params_mut().set_num_epochs(1).unwrap();
                        trainer.train(&inputs, &outputs).unwrap();
                        trainer.into_model()
                    }
                    "away_from_worse" => {
                        let mut trainer = Trainer::away_from_worse(model, Viterbi::new());
                        trainer.params_mut().set_num_epochs(1).unwrap();
                        trainer.train(&inputs, &outputs).unwrap();
                        trainer.into_model()
                    }
                    _ => {
                        let mut trainer = Trainer::toward_better(model, Viterbi::new());
                        trainer.params_mut().set_num_epochs(1).unwrap();
                        trainer.train(&inputs, &outputs).unwrap();
                        trainer.into_model()
                    }
                };
                black_box(model)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_train);
criterion_main!(benches);
