//! Mass-action reaction kinds.
//!
//! A `Reaction` is one rate constant applied to a list of terms of a single
//! kind. Every term acts on whole flattened buffers, so one term covers the
//! population in every instance of the compartment at once. Adding a
//! reaction with the kind and rate of an existing one appends its terms
//! instead of creating a second reaction.
//!
//! Bulk populations are addressed by `PopulationId` inside the owning
//! compartment; boundary terms name the boundary compartment and address
//! populations on both sides.

use crate::biochemistry::{CompartmentId, GeneId, PopulationId};
use crate::error::{Result, SimError};

/// Populations of one boundary term: `bulk` live in the reaction's
/// compartment, `surface` in the boundary compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTerms<const B: usize, const S: usize> {
    pub boundary: CompartmentId,
    pub bulk: [PopulationId; B],
    pub surface: [PopulationId; S],
}

/// Term lists; array order follows the reaction scheme left to right.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionKind {
    /// A → ∅
    Annihilation(Vec<[PopulationId; 1]>),
    /// A + B → C
    Association(Vec<[PopulationId; 3]>),
    /// C → A + B, as `[C, A, B]`
    Dissociation(Vec<[PopulationId; 3]>),
    /// 2A → C
    Dimerization(Vec<[PopulationId; 2]>),
    /// C → 2A, as `[C, A]`
    DimerDissociation(Vec<[PopulationId; 2]>),
    /// A → B
    Transformation(Vec<[PopulationId; 2]>),
    /// E + A → 2E, as `[E, A]`
    AutocatalyticTransformation(Vec<[PopulationId; 2]>),
    /// E + A → E, as `[E, A]`
    CatalyzedAnnihilation(Vec<[PopulationId; 2]>),
    /// E + A + B → E + C
    CatalyzedAssociation(Vec<[PopulationId; 4]>),
    /// E → E + P
    CatalyzedCreation(Vec<[PopulationId; 2]>),
    /// E + 2A → E + C
    CatalyzedDimerization(Vec<[PopulationId; 3]>),
    /// E + C → E + 2A, as `[E, C, A]`
    CatalyzedDimerDissociation(Vec<[PopulationId; 3]>),
    /// E + A → E + B
    CatalyzedTransformation(Vec<[PopulationId; 3]>),
    /// E + C → E + A + B, as `[E, C, A, B]`
    CatalyzedDissociation(Vec<[PopulationId; 4]>),
    /// gene → gene + P
    Transcription(Vec<(GeneId, PopulationId)>),
    /// A (bulk) + R (surface) → C (surface); surface `[R, C]`
    BoundaryAssociation(Vec<BoundaryTerms<1, 2>>),
    /// C (surface) → A (bulk) + R (surface); surface `[C, R]`
    BoundaryDissociation(Vec<BoundaryTerms<1, 2>>),
    /// A (bulk) → B (surface)
    BoundaryTransportTo(Vec<BoundaryTerms<1, 1>>),
    /// A (surface) → B (bulk)
    BoundaryTransportFrom(Vec<BoundaryTerms<1, 1>>),
    /// E (surface) + A (bulk) → E + B (bulk); bulk `[A, B]`
    CatalyzedBoundaryActivation(Vec<BoundaryTerms<2, 1>>),
}

/// A concentration field a term reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    /// Bulk concentration in the reaction's compartment
    Bulk(PopulationId),
    /// Bulk population as seen on a boundary; changes go to its flux
    AtBoundary {
        population: PopulationId,
        boundary: CompartmentId,
    },
    /// Population living in the boundary compartment
    Surface {
        boundary: CompartmentId,
        population: PopulationId,
    },
    /// Gene drive in the reaction's compartment
    Gene(GeneId),
}

/// One term in mass-action form: intensity `k dt Π reactants`, then
/// `species += coefficient * intensity` for every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Stoichiometry {
    pub reactants: Vec<Species>,
    pub changes: Vec<(Species, f64)>,
}

impl Stoichiometry {
    fn new(reactants: Vec<Species>, changes: Vec<(Species, f64)>) -> Self {
        Self { reactants, changes }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub rate: f64,
    pub kind: ReactionKind,
}

impl Reaction {
    pub fn new(rate: f64, kind: ReactionKind) -> Self {
        Self { rate, kind }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Same kind and rate: the two can share one batched instance.
    pub fn is_mergeable_with(&self, other: &Reaction) -> bool {
        self.rate == other.rate
            && std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }

    /// Append the terms of `other`, which must have the same kind.
    pub fn merge(&mut self, other: Reaction) -> Result<()> {
        use ReactionKind::*;
        match (&mut self.kind, other.kind) {
            (Annihilation(a), Annihilation(b)) => a.extend(b),
            (Association(a), Association(b)) => a.extend(b),
            (Dissociation(a), Dissociation(b)) => a.extend(b),
            (Dimerization(a), Dimerization(b)) => a.extend(b),
            (DimerDissociation(a), DimerDissociation(b)) => a.extend(b),
            (Transformation(a), Transformation(b)) => a.extend(b),
            (AutocatalyticTransformation(a), AutocatalyticTransformation(b)) => a.extend(b),
            (CatalyzedAnnihilation(a), CatalyzedAnnihilation(b)) => a.extend(b),
            (CatalyzedAssociation(a), CatalyzedAssociation(b)) => a.extend(b),
            (CatalyzedCreation(a), CatalyzedCreation(b)) => a.extend(b),
            (CatalyzedDimerization(a), CatalyzedDimerization(b)) => a.extend(b),
            (CatalyzedDimerDissociation(a), CatalyzedDimerDissociation(b)) => a.extend(b),
            (CatalyzedTransformation(a), CatalyzedTransformation(b)) => a.extend(b),
            (CatalyzedDissociation(a), CatalyzedDissociation(b)) => a.extend(b),
            (Transcription(a), Transcription(b)) => a.extend(b),
            (BoundaryAssociation(a), BoundaryAssociation(b)) => a.extend(b),
            (BoundaryDissociation(a), BoundaryDissociation(b)) => a.extend(b),
            (BoundaryTransportTo(a), BoundaryTransportTo(b)) => a.extend(b),
            (BoundaryTransportFrom(a), BoundaryTransportFrom(b)) => a.extend(b),
            (CatalyzedBoundaryActivation(a), CatalyzedBoundaryActivation(b)) => a.extend(b),
            (existing, incoming) => {
                return Err(SimError::IncompatibleReaction {
                    existing: existing.name(),
                    incoming: incoming.name(),
                })
            }
        }
        Ok(())
    }

    pub fn term_count(&self) -> usize {
        self.kind.term_count()
    }

    /// Mass-action form of every term.
    pub fn stoichiometry(&self) -> Vec<Stoichiometry> {
        use ReactionKind::*;
        use Species::{Bulk, Gene};

        fn at(boundary: CompartmentId, population: PopulationId) -> Species {
            Species::AtBoundary { population, boundary }
        }
        fn surface(boundary: CompartmentId, population: PopulationId) -> Species {
            Species::Surface { boundary, population }
        }

        match &self.kind {
            Annihilation(t) => t
                .iter()
                .map(|&[a]| Stoichiometry::new(vec![Bulk(a)], vec![(Bulk(a), -1.0)]))
                .collect(),
            Association(t) => t
                .iter()
                .map(|&[a, b, c]| {
                    Stoichiometry::new(
                        vec![Bulk(a), Bulk(b)],
                        vec![(Bulk(a), -1.0), (Bulk(b), -1.0), (Bulk(c), 1.0)],
                    )
                })
                .collect(),
            Dissociation(t) => t
                .iter()
                .map(|&[c, a, b]| {
                    Stoichiometry::new(
                        vec![Bulk(c)],
                        vec![(Bulk(c), -1.0), (Bulk(a), 1.0), (Bulk(b), 1.0)],
                    )
                })
                .collect(),
            Dimerization(t) => t
                .iter()
                .map(|&[a, c]| {
                    Stoichiometry::new(vec![Bulk(a), Bulk(a)], vec![(Bulk(a), -2.0), (Bulk(c), 1.0)])
                })
                .collect(),
            DimerDissociation(t) => t
                .iter()
                .map(|&[c, a]| Stoichiometry::new(vec![Bulk(c)], vec![(Bulk(c), -1.0), (Bulk(a), 2.0)]))
                .collect(),
            Transformation(t) => t
                .iter()
                .map(|&[a, b]| Stoichiometry::new(vec![Bulk(a)], vec![(Bulk(a), -1.0), (Bulk(b), 1.0)]))
                .collect(),
            AutocatalyticTransformation(t) => t
                .iter()
                .map(|&[e, a]| {
                    Stoichiometry::new(vec![Bulk(e), Bulk(a)], vec![(Bulk(a), -1.0), (Bulk(e), 1.0)])
                })
                .collect(),
            CatalyzedAnnihilation(t) => t
                .iter()
                .map(|&[e, a]| Stoichiometry::new(vec![Bulk(e), Bulk(a)], vec![(Bulk(a), -1.0)]))
                .collect(),
            CatalyzedAssociation(t) => t
                .iter()
                .map(|&[e, a, b, c]| {
                    Stoichiometry::new(
                        vec![Bulk(e), Bulk(a), Bulk(b)],
                        vec![(Bulk(a), -1.0), (Bulk(b), -1.0), (Bulk(c), 1.0)],
                    )
                })
                .collect(),
            CatalyzedCreation(t) => t
                .iter()
                .map(|&[e, p]| Stoichiometry::new(vec![Bulk(e)], vec![(Bulk(p), 1.0)]))
                .collect(),
            CatalyzedDimerization(t) => t
                .iter()
                .map(|&[e, a, c]| {
                    Stoichiometry::new(
                        vec![Bulk(e), Bulk(a), Bulk(a)],
                        vec![(Bulk(a), -2.0), (Bulk(c), 1.0)],
                    )
                })
                .collect(),
            CatalyzedDimerDissociation(t) => t
                .iter()
                .map(|&[e, c, a]| {
                    Stoichiometry::new(vec![Bulk(e), Bulk(c)], vec![(Bulk(c), -1.0), (Bulk(a), 2.0)])
                })
                .collect(),
            CatalyzedTransformation(t) => t
                .iter()
                .map(|&[e, a, b]| {
                    Stoichiometry::new(vec![Bulk(e), Bulk(a)], vec![(Bulk(a), -1.0), (Bulk(b), 1.0)])
                })
                .collect(),
            CatalyzedDissociation(t) => t
                .iter()
                .map(|&[e, c, a, b]| {
                    Stoichiometry::new(
                        vec![Bulk(e), Bulk(c)],
                        vec![(Bulk(c), -1.0), (Bulk(a), 1.0), (Bulk(b), 1.0)],
                    )
                })
                .collect(),
            Transcription(t) => t
                .iter()
                .map(|&(g, p)| Stoichiometry::new(vec![Gene(g)], vec![(Bulk(p), 1.0)]))
                .collect(),
            BoundaryAssociation(t) => t
                .iter()
                .map(|term| {
                    let [a] = term.bulk;
                    let [r, c] = term.surface;
                    let m = term.boundary;
                    Stoichiometry::new(
                        vec![at(m, a), surface(m, r)],
                        vec![(at(m, a), -1.0), (surface(m, r), -1.0), (surface(m, c), 1.0)],
                    )
                })
                .collect(),
            BoundaryDissociation(t) => t
                .iter()
                .map(|term| {
                    let [a] = term.bulk;
                    let [c, r] = term.surface;
                    let m = term.boundary;
                    Stoichiometry::new(
                        vec![surface(m, c)],
                        vec![(surface(m, c), -1.0), (at(m, a), 1.0), (surface(m, r), 1.0)],
                    )
                })
                .collect(),
            BoundaryTransportTo(t) => t
                .iter()
                .map(|term| {
                    let [a] = term.bulk;
                    let [b] = term.surface;
                    let m = term.boundary;
                    Stoichiometry::new(vec![at(m, a)], vec![(at(m, a), -1.0), (surface(m, b), 1.0)])
                })
                .collect(),
            BoundaryTransportFrom(t) => t
                .iter()
                .map(|term| {
                    let [b] = term.bulk;
                    let [a] = term.surface;
                    let m = term.boundary;
                    Stoichiometry::new(vec![surface(m, a)], vec![(surface(m, a), -1.0), (at(m, b), 1.0)])
                })
                .collect(),
            CatalyzedBoundaryActivation(t) => t
                .iter()
                .map(|term| {
                    let [a, b] = term.bulk;
                    let [e] = term.surface;
                    let m = term.boundary;
                    Stoichiometry::new(
                        vec![surface(m, e), at(m, a)],
                        vec![(at(m, a), -1.0), (at(m, b), 1.0)],
                    )
                })
                .collect(),
        }
    }
}

impl ReactionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReactionKind::Annihilation(_) => "Annihilation",
            ReactionKind::Association(_) => "Association",
            ReactionKind::Dissociation(_) => "Dissociation",
            ReactionKind::Dimerization(_) => "Dimerization",
            ReactionKind::DimerDissociation(_) => "DimerDissociation",
            ReactionKind::Transformation(_) => "Transformation",
            ReactionKind::AutocatalyticTransformation(_) => "AutocatalyticTransformation",
            ReactionKind::CatalyzedAnnihilation(_) => "CatalyzedAnnihilation",
            ReactionKind::CatalyzedAssociation(_) => "CatalyzedAssociation",
            ReactionKind::CatalyzedCreation(_) => "CatalyzedCreation",
            ReactionKind::CatalyzedDimerization(_) => "CatalyzedDimerization",
            ReactionKind::CatalyzedDimerDissociation(_) => "CatalyzedDimerDissociation",
            ReactionKind::CatalyzedTransformation(_) => "CatalyzedTransformation",
            ReactionKind::CatalyzedDissociation(_) => "CatalyzedDissociation",
            ReactionKind::Transcription(_) => "Transcription",
            ReactionKind::BoundaryAssociation(_) => "BoundaryAssociation",
            ReactionKind::BoundaryDissociation(_) => "BoundaryDissociation",
            ReactionKind::BoundaryTransportTo(_) => "BoundaryTransportTo",
            ReactionKind::BoundaryTransportFrom(_) => "BoundaryTransportFrom",
            ReactionKind::CatalyzedBoundaryActivation(_) => "CatalyzedBoundaryActivation",
        }
    }

    pub fn term_count(&self) -> usize {
        match self {
            ReactionKind::Annihilation(t) => t.len(),
            ReactionKind::Association(t) | ReactionKind::Dissociation(t) => t.len(),
            ReactionKind::Dimerization(t)
            | ReactionKind::DimerDissociation(t)
            | ReactionKind::Transformation(t)
            | ReactionKind::AutocatalyticTransformation(t)
            | ReactionKind::CatalyzedAnnihilation(t)
            | ReactionKind::CatalyzedCreation(t) => t.len(),
            ReactionKind::CatalyzedDimerization(t)
            | ReactionKind::CatalyzedDimerDissociation(t)
            | ReactionKind::CatalyzedTransformation(t) => t.len(),
            ReactionKind::CatalyzedAssociation(t) | ReactionKind::CatalyzedDissociation(t) => t.len(),
            ReactionKind::Transcription(t) => t.len(),
            ReactionKind::BoundaryAssociation(t) | ReactionKind::BoundaryDissociation(t) => t.len(),
            ReactionKind::BoundaryTransportTo(t) | ReactionKind::BoundaryTransportFrom(t) => t.len(),
            ReactionKind::CatalyzedBoundaryActivation(t) => t.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_appends_terms() {
        let mut r = Reaction::new(0.5, ReactionKind::Transformation(vec![[0, 1]]));
        let other = Reaction::new(0.5, ReactionKind::Transformation(vec![[2, 3]]));
        assert!(r.is_mergeable_with(&other));
        r.merge(other).unwrap();
        assert_eq!(r.term_count(), 2);
    }

    #[test]
    fn test_merge_rejects_other_kind() {
        let mut r = Reaction::new(0.5, ReactionKind::Transformation(vec![[0, 1]]));
        let err = r
            .merge(Reaction::new(0.5, ReactionKind::Annihilation(vec![[0]])))
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::IncompatibleReaction {
                existing: "Transformation",
                incoming: "Annihilation"
            }
        ));
    }

    #[test]
    fn test_different_rates_do_not_merge() {
        let a = Reaction::new(0.5, ReactionKind::Annihilation(vec![[0]]));
        let b = Reaction::new(0.6, ReactionKind::Annihilation(vec![[0]]));
        assert!(!a.is_mergeable_with(&b));
    }

    #[test]
    fn test_boundary_association_writes_flux() {
        let r = Reaction::new(
            1.0,
            ReactionKind::BoundaryAssociation(vec![BoundaryTerms {
                boundary: 3,
                bulk: [0],
                surface: [1, 2],
            }]),
        );
        let law = &r.stoichiometry()[0];
        assert_eq!(
            law.reactants[0],
            Species::AtBoundary {
                population: 0,
                boundary: 3
            }
        );
        assert!(law.changes.contains(&(
            Species::Surface {
                boundary: 3,
                population: 2
            },
            1.0
        )));
    }
}
