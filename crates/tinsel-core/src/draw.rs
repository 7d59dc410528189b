//! The draw engine: participant list → derangement.
//!
//! The participant list is shuffled with Fisher–Yates and every participant
//! gives to their successor in the shuffled order, wrapping at the end. The
//! result is always a single cycle through everyone, so nobody draws
//! themselves as long as emails are distinct.
//!
//! Email uniqueness is the caller's responsibility; see
//! [`ensure_unique_emails`](crate::participant::ensure_unique_emails).

use std::collections::BTreeSet;

use rand::Rng;

use crate::{
  Error, Result,
  group::AssignmentMap,
  participant::{Entrant, Match},
};

/// Draw with a fresh thread-local RNG.
pub fn draw<P: Entrant>(participants: &[P]) -> Result<AssignmentMap> {
  draw_with_rng(participants, &mut rand::thread_rng())
}

/// Draw using the supplied random source.
///
/// Fails with [`Error::InsufficientParticipants`] when fewer than two
/// participants are given.
pub fn draw_with_rng<P, R>(participants: &[P], rng: &mut R) -> Result<AssignmentMap>
where
  P: Entrant,
  R: Rng + ?Sized,
{
  let n = participants.len();
  if n < 2 {
    return Err(Error::InsufficientParticipants { found: n });
  }

  let mut order: Vec<&P> = participants.iter().collect();
  shuffle(&mut order, rng);

  let mut assignments = AssignmentMap::new();
  for (i, giver) in order.iter().enumerate() {
    let mut next = (i + 1) % n;
    // Only reachable when two entries share an email.
    if order[next].email() == giver.email() {
      next = (next + 1) % n;
    }
    let recipient = order[next];
    assignments.insert(
      giver.email().to_owned(),
      Match::new(recipient.name(), recipient.email()),
    );
  }

  Ok(assignments)
}

/// Fisher–Yates, walking down from the last index.
fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
  for i in (1..items.len()).rev() {
    let j = rng.gen_range(0..=i);
    items.swap(i, j);
  }
}

/// Check that `assignments` is a derangement of `participants`: one entry per
/// participant, every participant received exactly once, nobody assigned to
/// themselves.
pub fn verify_derangement<P: Entrant>(
  participants: &[P],
  assignments:  &AssignmentMap,
) -> Result<()> {
  if assignments.len() != participants.len() {
    return Err(Error::InvalidAssignment(format!(
      "{} assignments for {} participants",
      assignments.len(),
      participants.len()
    )));
  }

  let known: BTreeSet<&str> = participants.iter().map(Entrant::email).collect();
  let mut received = BTreeSet::new();

  for p in participants {
    let target = assignments.get(p.email()).ok_or_else(|| {
      Error::InvalidAssignment(format!("{} has no recipient", p.email()))
    })?;
    if target.email == p.email() {
      return Err(Error::InvalidAssignment(format!(
        "{} is assigned to themselves",
        p.email()
      )));
    }
    if !known.contains(target.email.as_str()) {
      return Err(Error::InvalidAssignment(format!(
        "{} is not a participant",
        target.email
      )));
    }
    if !received.insert(target.email.as_str()) {
      return Err(Error::InvalidAssignment(format!(
        "{} receives more than one gift",
        target.email
      )));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::{HashMap, HashSet};

  use proptest::prelude::*;
  use rand::{SeedableRng, rngs::StdRng};

  use super::*;

  fn people(n: usize) -> Vec<Match> {
    (0..n)
      .map(|i| Match::new(format!("Person {i}"), format!("p{i}@example.com")))
      .collect()
  }

  /// Length of the cycle containing the first giver.
  fn cycle_len(assignments: &AssignmentMap) -> usize {
    let Some(start) = assignments.keys().next() else { return 0 };
    let mut cur = start.as_str();
    let mut len = 0;
    loop {
      cur = assignments[cur].email.as_str();
      len += 1;
      if cur == start || len > assignments.len() {
        return len;
      }
    }
  }

  #[test]
  fn empty_list_is_rejected() {
    let err = draw::<Match>(&[]).unwrap_err();
    assert!(matches!(err, Error::InsufficientParticipants { found: 0 }));
  }

  #[test]
  fn single_participant_is_rejected() {
    let err = draw(&people(1)).unwrap_err();
    assert!(matches!(err, Error::InsufficientParticipants { found: 1 }));
  }

  #[test]
  fn two_participants_always_swap() {
    let ps = people(2);
    for seed in 0..50 {
      let map = draw_with_rng(&ps, &mut StdRng::seed_from_u64(seed)).unwrap();
      assert_eq!(map["p0@example.com"].email, "p1@example.com");
      assert_eq!(map["p1@example.com"].email, "p0@example.com");
    }
  }

  #[test]
  fn same_seed_gives_same_draw() {
    let ps = people(8);
    let a = draw_with_rng(&ps, &mut StdRng::seed_from_u64(7)).unwrap();
    let b = draw_with_rng(&ps, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn recipient_names_follow_emails() {
    let ps = people(6);
    let map = draw(&ps).unwrap();
    for target in map.values() {
      let owner = ps.iter().find(|p| p.email == target.email).unwrap();
      assert_eq!(owner.name, target.name);
    }
  }

  #[test]
  fn repeated_draws_are_each_valid() {
    let ps = people(5);
    for _ in 0..20 {
      let map = draw(&ps).unwrap();
      verify_derangement(&ps, &map).unwrap();
    }
  }

  #[test]
  fn every_other_participant_is_reachable() {
    let ps = people(5);
    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..2_000 {
      let map = draw_with_rng(&ps, &mut rng).unwrap();
      for (giver, target) in map {
        seen.entry(giver).or_default().insert(target.email);
      }
    }
    for p in &ps {
      let targets = &seen[&p.email];
      assert_eq!(targets.len(), 4, "{} reached {targets:?}", p.email);
      assert!(!targets.contains(&p.email));
    }
  }

  #[test]
  fn duplicate_emails_break_the_guard_and_are_caught() {
    let ps = vec![Match::new("A", "a@example.com"), Match::new("A again", "a@example.com")];
    let map = draw(&ps).unwrap();
    assert!(matches!(
      verify_derangement(&ps, &map),
      Err(Error::InvalidAssignment(_))
    ));
  }

  #[test]
  fn verify_rejects_self_assignment() {
    let ps = people(2);
    let mut map = AssignmentMap::new();
    map.insert("p0@example.com".into(), ps[0].clone());
    map.insert("p1@example.com".into(), ps[0].clone());
    assert!(verify_derangement(&ps, &map).is_err());
  }

  #[test]
  fn verify_rejects_double_recipient() {
    let ps = people(3);
    let mut map = AssignmentMap::new();
    map.insert("p0@example.com".into(), ps[1].clone());
    map.insert("p1@example.com".into(), ps[0].clone());
    map.insert("p2@example.com".into(), ps[0].clone());
    assert!(verify_derangement(&ps, &map).is_err());
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn draw_is_a_bijection(n in 2usize..40, seed in any::<u64>()) {
      let ps = people(n);
      let map = draw_with_rng(&ps, &mut StdRng::seed_from_u64(seed)).unwrap();

      prop_assert_eq!(map.len(), n);
      let givers: HashSet<&str> = map.keys().map(String::as_str).collect();
      let receivers: HashSet<&str> = map.values().map(|m| m.email.as_str()).collect();
      let everyone: HashSet<&str> = ps.iter().map(|p| p.email.as_str()).collect();
      prop_assert_eq!(&givers, &everyone);
      prop_assert_eq!(&receivers, &everyone);
    }

    #[test]
    fn draw_has_no_fixed_points(n in 2usize..40, seed in any::<u64>()) {
      let ps = people(n);
      let map = draw_with_rng(&ps, &mut StdRng::seed_from_u64(seed)).unwrap();
      for p in &ps {
        prop_assert_ne!(&map[&p.email].email, &p.email);
      }
      prop_assert!(verify_derangement(&ps, &map).is_ok());
    }

    #[test]
    fn draw_forms_a_single_cycle(n in 2usize..40, seed in any::<u64>()) {
      let ps = people(n);
      let map = draw_with_rng(&ps, &mut StdRng::seed_from_u64(seed)).unwrap();
      prop_assert_eq!(cycle_len(&map), n);
    }
  }
}
