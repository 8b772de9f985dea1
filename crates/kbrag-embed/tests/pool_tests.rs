use kbrag_embed::{cosine_similarity, l2_normalize};

#[test]
fn l2_normalize_basic() {
    let mut v = vec![1.0f32, 2.0, 3.0, 4.0];
    l2_normalize(&mut v);
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn zero_vector_is_left_alone() {
    let mut v = vec![0.0f32; 3];
    l2_normalize(&mut v);
    assert_eq!(v, vec![0.0; 3]);
    assert_eq!(cosine_similarity(&v, &[1.0, 0.0, 0.0]), 0.0);
}

#[test]
fn cosine_of_parallel_and_orthogonal_vectors() {
    assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
}
