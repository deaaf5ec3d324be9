use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use family_tree_renderer::config::LayoutConfig;
use family_tree_renderer::ir::{Genre, Person, PersonId, parse_persons};
use family_tree_renderer::layout::{apply_overrides, compute_diagram, compute_layout};
use family_tree_renderer::render::render_svg;
use family_tree_renderer::store::{OverrideMap, PositionOverride};
use family_tree_renderer::theme::Theme;
use std::hint::black_box;

fn person(id: String, genre: Genre, pere: Option<&PersonId>, mere: Option<&PersonId>, ordre: i64) -> Person {
    let mut p = Person::new(PersonId::new(id).expect("generated ids are non-empty"));
    p.prenom = p.id.to_string();
    p.genre = Some(genre);
    p.pere = pere.cloned();
    p.mere = mere.cloned();
    p.ordre_naissance = Some(ordre);
    p
}

/// One founding couple; every child of a non-final generation marries in a
/// spouse and has `children` children of its own.
fn generated_family(generations: usize, children: usize) -> Vec<Person> {
    let mut persons = vec![
        person("g0-0".into(), Genre::Homme, None, None, 1),
        person("g0-1".into(), Genre::Femme, None, None, 1),
    ];
    let mut couples = vec![(persons[0].id.clone(), persons[1].id.clone())];
    for generation in 1..generations {
        let mut next = Vec::new();
        for (couple_idx, (pere, mere)) in couples.iter().enumerate() {
            for child in 0..children {
                let id = format!("g{generation}-{couple_idx}-{child}");
                let genre = if child % 2 == 0 { Genre::Homme } else { Genre::Femme };
                persons.push(person(id.clone(), genre, Some(pere), Some(mere), child as i64 + 1));
                if generation + 1 < generations {
                    let spouse = person(format!("{id}-spouse"), Genre::Femme, None, None, 1);
                    let child_id = PersonId::new(id).expect("generated ids are non-empty");
                    let pair = if genre == Genre::Homme {
                        (child_id, spouse.id.clone())
                    } else {
                        (spouse.id.clone(), child_id)
                    };
                    persons.push(spouse);
                    next.push(pair);
                }
            }
        }
        couples = next;
    }
    persons
}

fn fixture(name: &str) -> &'static str {
    match name {
        "couple_children" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/couple_children.json"
        )),
        "three_generations" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/three_generations.json"
        )),
        _ => panic!("unknown fixture: {name}"),
    }
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for name in ["couple_children", "three_generations"] {
        let persons = parse_persons(fixture(name)).expect("parse failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &persons, |b, persons| {
            b.iter(|| {
                let layout = compute_layout(black_box(persons), &config, (1200.0, 800.0));
                black_box(layout.nodes.len());
            });
        });
    }
    for (generations, children) in [(3, 3), (4, 3), (5, 3), (6, 2)] {
        let persons = generated_family(generations, children);
        let name = format!("generated_{generations}x{children}_{}", persons.len());
        group.bench_with_input(BenchmarkId::from_parameter(name), &persons, |b, persons| {
            b.iter(|| {
                let layout = compute_layout(black_box(persons), &config, (1200.0, 800.0));
                black_box(layout.links.len());
            });
        });
    }
    group.finish();
}

fn bench_overrides(c: &mut Criterion) {
    let mut group = c.benchmark_group("overrides");
    let config = LayoutConfig::default();
    for (generations, children) in [(4, 3), (5, 3)] {
        let persons = generated_family(generations, children);
        let overrides: OverrideMap = persons
            .iter()
            .step_by(3)
            .map(|p| (p.id.clone(), PositionOverride::new(100.0, 100.0)))
            .collect();
        let base = compute_layout(&persons, &config, (1200.0, 800.0));
        group.bench_with_input(
            BenchmarkId::from_parameter(persons.len()),
            &overrides,
            |b, overrides| {
                b.iter(|| {
                    let mut layout = base.clone();
                    black_box(apply_overrides(&mut layout, black_box(overrides), &config));
                });
            },
        );
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let config = LayoutConfig::default();
    let theme = Theme::modern();
    for (generations, children) in [(3, 3), (5, 3)] {
        let persons = generated_family(generations, children);
        group.bench_with_input(
            BenchmarkId::from_parameter(persons.len()),
            &persons,
            |b, persons| {
                b.iter(|| {
                    let layout = compute_diagram(persons, &OverrideMap::new(), &config, (1200.0, 800.0));
                    black_box(render_svg(&layout, &theme).len());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_overrides, bench_end_to_end
);
criterion_main!(benches);
