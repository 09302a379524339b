use trainkit::prepare::{
    prepare, prepare_dataset, prepare_with_policy, BatchPolicy, PrepareError, RawDataset, RawRecord,
};
use ndarray::prelude::*;
use rand::{distributions::Uniform, thread_rng, Rng};

/// Generate random greyscale records with labels in `0..nb_classes`.
fn gen_records(len: usize, height: usize, width: usize, nb_classes: i64) -> Vec<RawRecord> {
    let mut rng = thread_rng();
    let pixels_distrib = Uniform::new_inclusive(0u8, 255);
    let labels_distrib = Uniform::new(0, nb_classes);
    (0..len)
        .map(|_| {
            let pixels: Vec<u8> = (0..height * width).map(|_| rng.sample(pixels_distrib)).collect();
            RawRecord::from_pixels(pixels, (height, width, 1), rng.sample(labels_distrib)).unwrap()
        })
        .collect()
}

fn labelled(labels: &[i64]) -> Vec<RawRecord> {
    labels
        .iter()
        .enumerate()
        .map(|(i, &l)| RawRecord::from_pixels(vec![i as u8; 4], (2, 2, 1), l).unwrap())
        .collect()
}

#[test]
fn four_records_make_two_one_hot_batches() -> Result<(), Box<dyn std::error::Error>> {
    let train = labelled(&[0, 1, 2, 1]);
    let ds = prepare(&train, &[], 2, 4, 3)?;

    assert_eq!(ds.train.len(), 2);
    let labels: Vec<Vec<Vec<f32>>> = ds
        .train
        .iter()
        .map(|b| b.examples.iter().map(|e| e.label.to_vec()).collect())
        .collect();
    assert_eq!(
        labels,
        vec![
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            vec![vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]],
        ]
    );
    Ok(())
}

#[test]
fn even_split_covers_every_record_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let (h, w) = (6, 5);
    for (len, batch_size) in [(12, 3), (64, 16), (7, 7), (10, 1)] {
        let train = gen_records(len, h, w, 10);
        let ds = prepare(&train, &[], batch_size, h * w, 10)?;

        assert_eq!(ds.train.len(), len / batch_size);
        assert!(ds.train.iter().all(|b| b.len() == batch_size));

        let flat: Vec<_> = ds.train.iter().flat_map(|b| b.examples.iter()).collect();
        assert_eq!(flat.len(), len);
        for (example, record) in flat.iter().zip(&train) {
            let expected: Array1<f32> = record.image.iter().map(|&p| p as f32).collect();
            assert_eq!(example.input, expected);
            assert_eq!(example.class_index(), Some(record.label as usize));
        }
    }
    Ok(())
}

#[test]
fn test_split_is_flat_and_ordered() -> Result<(), Box<dyn std::error::Error>> {
    let test = gen_records(9, 4, 4, 5);
    let ds = prepare(&[], &test, 4, 16, 5)?;

    assert!(ds.train.is_empty());
    assert_eq!(ds.test.len(), 9);
    for (example, record) in ds.test.iter().zip(&test) {
        assert_eq!(example.input.len(), 16);
        assert_eq!(example.label.sum(), 1.0);
        assert_eq!(example.class_index(), Some(record.label as usize));
    }
    Ok(())
}

#[test]
fn uneven_split_keeps_short_final_batch_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let train = labelled(&[0, 1, 0, 1, 0]);
    let ds = prepare(&train, &[], 2, 4, 2)?;

    let sizes: Vec<usize> = ds.train.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(ds.num_train_examples(), 5);
    assert_eq!(ds.train[2].examples[0].input.to_vec(), vec![4.0; 4]);
    Ok(())
}

#[test]
fn uneven_split_under_other_policies() {
    let train = labelled(&[0, 1, 0, 1, 0]);

    let dropped = prepare_with_policy(&train, &[], 2, 4, 2, BatchPolicy::DropShort).unwrap();
    assert_eq!(dropped.train.len(), 2);
    assert_eq!(dropped.num_train_examples(), 4);

    let strict = prepare_with_policy(&train, &[], 2, 4, 2, BatchPolicy::Strict);
    assert_eq!(
        strict,
        Err(PrepareError::BatchBounds {
            len: 5,
            batch_size: 2
        })
    );
}

#[test]
fn mismatched_shapes_always_fail() {
    let train = gen_records(3, 28, 28, 10);
    for n_inputs in [1, 783, 785, 28] {
        assert_eq!(
            prepare(&train, &[], 1, n_inputs, 10),
            Err(PrepareError::Shape {
                expected: n_inputs,
                got: 784
            })
        );
    }
    let ds = prepare(&train, &[], 1, 784, 10).unwrap();
    assert!(ds.train.iter().all(|b| b.examples[0].input.len() == 784));
}

#[test]
fn out_of_range_labels_fail_in_either_split() {
    let bad = labelled(&[0, 3]);
    assert_eq!(
        prepare(&bad, &[], 2, 4, 3),
        Err(PrepareError::LabelRange {
            label: 3,
            num_classes: 3
        })
    );
    let negative = labelled(&[-1]);
    assert!(matches!(
        prepare(&[], &negative, 2, 4, 3),
        Err(PrepareError::LabelRange { label: -1, .. })
    ));
}

#[test]
fn batches_stack_into_training_matrices() -> Result<(), Box<dyn std::error::Error>> {
    let raw = RawDataset {
        train: gen_records(8, 3, 3, 4),
        test: gen_records(2, 3, 3, 4),
    };
    let ds = prepare_dataset(raw, 4, 9, 4)?;
    for batch in &ds.train {
        let (x, y) = batch.to_arrays();
        assert_eq!(x.dim(), (4, 9));
        assert_eq!(y.dim(), (4, 4));
        assert_eq!(y.sum_axis(Axis(1)), Array1::from_elem(4, 1.0));
    }
    Ok(())
}
