//! Benchmarks for vellum-render CPU-side work: transform packing and
//! vertex generation for a frame's worth of pages.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vellum_core::gpu::{push_color_quad, TexVertex};
use vellum_core::{Affine, Rect, TransformStack};
use vellum_render::vertex::TransformUniform;

fn page_rects(n: usize) -> Vec<Rect> {
    (0..n)
        .map(|i| Rect::new(20.0, 20.0 + i as f32 * 812.0, 612.0, 792.0))
        .collect()
}

fn bench_transform_uniform(c: &mut Criterion) {
    let affine = Affine::rect_to_clip(&Rect::new(0.0, 100.0, 1280.0, 800.0));
    c.bench_function("TransformUniform::from_affine", |b| {
        b.iter(|| black_box(TransformUniform::from_affine(black_box(&affine))))
    });
}

fn bench_page_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_transforms");
    for &count in &[10, 100] {
        let pages = page_rects(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &pages, |b, pages| {
            let base = Affine::rect_to_clip(&Rect::new(0.0, 0.0, 1280.0, 800.0));
            b.iter(|| {
                let mut stack = TransformStack::new(base);
                let mut out = Vec::with_capacity(pages.len());
                for page in pages {
                    stack.save();
                    stack.translate(page.origin.x, page.origin.y);
                    out.push(TransformUniform::from_affine(&stack.current()));
                    stack.restore();
                }
                black_box(out)
            });
        });
    }
    group.finish();
}

fn bench_border_vertices(c: &mut Criterion) {
    let pages = page_rects(100);
    c.bench_function("border_quads_100", |b| {
        b.iter(|| {
            let mut verts = Vec::with_capacity(pages.len() * 12);
            for page in &pages {
                push_color_quad(&mut verts, &page.outset(1.0), [64, 64, 64, 255]);
                push_color_quad(&mut verts, page, [255, 255, 255, 160]);
            }
            black_box(verts)
        })
    });
}

fn bench_tex_quad(c: &mut Criterion) {
    let rect = Rect::new(0.0, 0.0, 612.0, 792.0);
    c.bench_function("TexVertex::quad", |b| {
        b.iter(|| black_box(TexVertex::quad(black_box(&rect))))
    });
}

criterion_group!(
    benches,
    bench_transform_uniform,
    bench_page_transforms,
    bench_border_vertices,
    bench_tex_quad
);
criterion_main!(benches);
