//! GraphQL documents sent to GitHub.
//!
//! Date-ranged queries take `$fromDate`/`$toDate`; paginated ones take `$cursor`.
//! Every paginated collection carries a `pageInfo` sibling to its `nodes`.

pub const USER_INFO: &str = r#"
query userInfo($login: String!, $size: Int) {
  user(login: $login) {
    id
    login
    name
    bio
    url
    email
    avatarUrl(size: $size)
    twitterUsername
    websiteUrl
  }
}
"#;

pub const REPOSITORY_INFO: &str = r#"
query repository($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    owner { login }
    name
    nameWithOwner
    id
    url
    labels(first: 100) {
      totalCount
      nodes { name description }
    }
    languages(first: 50) {
      edges { size node { name } }
      totalCount
      totalSize
    }
    repositoryTopics(first: 50) {
      totalCount
      nodes { topic { name } }
    }
    primaryLanguage { name }
    stargazerCount
    forkCount
    watchers { totalCount }
  }
}
"#;

pub const REPOSITORIES_CONTRIBUTED_TO: &str = r#"
query repositoriesContributedTo($login: String!, $fromDate: DateTime, $toDate: DateTime) {
  user(login: $login) {
    contributionsCollection(from: $fromDate, to: $toDate) {
      issueContributionsByRepository(maxRepositories: 100) {
        repository { nameWithOwner }
      }
      commitContributionsByRepository(maxRepositories: 100) {
        repository { nameWithOwner }
      }
      pullRequestContributionsByRepository(maxRepositories: 100) {
        repository { nameWithOwner }
      }
      pullRequestReviewContributionsByRepository(maxRepositories: 100) {
        repository { nameWithOwner }
      }
    }
  }
}
"#;

pub const REPOSITORIES_COMMITTED_TO: &str = r#"
query repositoriesCommittedTo($login: String!, $fromDate: DateTime, $toDate: DateTime) {
  user(login: $login) {
    contributionsCollection(from: $fromDate, to: $toDate) {
      commitContributionsByRepository(maxRepositories: 100) {
        repository { nameWithOwner }
      }
    }
  }
}
"#;

pub const COMMITS: &str = r#"
query commits(
  $owner: String!
  $name: String!
  $authorId: ID!
  $fromDate: GitTimestamp
  $toDate: GitTimestamp
  $cursor: String
) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(author: { id: $authorId }, since: $fromDate, until: $toDate, after: $cursor) {
            totalCount
            pageInfo { endCursor hasNextPage }
            nodes {
              id
              oid
              commitUrl
              committedDate
              pushedDate
              changedFiles
              additions
              deletions
              message
              comments(first: 10) {
                nodes {
                  author { login }
                  publishedAt
                  position
                  reactions { totalCount }
                  body
                }
              }
              associatedPullRequests(first: 10) {
                nodes { id url }
              }
            }
          }
        }
      }
    }
  }
}
"#;

pub const ISSUES: &str = r#"
query issues($login: String!, $fromDate: DateTime, $toDate: DateTime, $cursor: String) {
  user(login: $login) {
    login
    contributionsCollection(from: $fromDate, to: $toDate) {
      startedAt
      endedAt
      issueContributions(first: 100, after: $cursor) {
        totalCount
        pageInfo { endCursor hasNextPage }
        nodes {
          issue {
            repository { owner { login } name }
            id
            url
            createdAt
            updatedAt
            closedAt
            state
            title
            body
            timelineItems(first: 100, itemTypes: [CLOSED_EVENT]) {
              nodes { ... on ClosedEvent { actor { login } } }
            }
            reactions { totalCount }
            labels(first: 10) {
              totalCount
              nodes { name description }
            }
            comments { totalCount }
          }
        }
      }
    }
  }
}
"#;

pub const PULL_REQUESTS: &str = r#"
query pullRequests($login: String!, $fromDate: DateTime, $toDate: DateTime, $cursor: String) {
  user(login: $login) {
    login
    contributionsCollection(from: $fromDate, to: $toDate) {
      startedAt
      endedAt
      pullRequestContributions(first: 40, after: $cursor) {
        totalCount
        pageInfo { endCursor hasNextPage }
        nodes {
          pullRequest {
            repository { owner { login } name }
            id
            url
            createdAt
            mergedAt
            closedAt
            updatedAt
            state
            reactions { totalCount }
            labels(first: 10) {
              totalCount
              nodes { name description }
            }
            title
            body
            commits(first: 10) {
              totalCount
              nodes {
                commit { id commitUrl changedFiles additions deletions }
              }
            }
            comments { totalCount }
            closingIssuesReferences(first: 10) {
              totalCount
              nodes { id url }
            }
          }
        }
      }
    }
  }
}
"#;

pub const PULL_REQUEST_REVIEWS: &str = r#"
query pullRequestReviews($login: String!, $fromDate: DateTime, $toDate: DateTime, $cursor: String) {
  user(login: $login) {
    login
    contributionsCollection(from: $fromDate, to: $toDate) {
      startedAt
      endedAt
      pullRequestReviewContributions(first: 100, after: $cursor) {
        totalCount
        pageInfo { endCursor hasNextPage }
        nodes {
          pullRequestReview {
            repository { owner { login } name }
            pullRequest { id url }
            createdAt
            updatedAt
            publishedAt
            submittedAt
            lastEditedAt
            id
            url
            state
            body
            comments(first: 50) {
              totalCount
              nodes { author { login } id url body }
            }
          }
        }
      }
    }
  }
}
"#;

// Backward pagination: each page is the `last: 100` items before the cursor,
// so the most recent comments arrive first.
pub const ISSUE_COMMENTS: &str = r#"
query issueComments($login: String!, $cursor: String) {
  user(login: $login) {
    issueComments(last: 100, before: $cursor) {
      totalCount
      pageInfo { startCursor hasPreviousPage }
      nodes {
        id
        url
        createdAt
        updatedAt
        publishedAt
        lastEditedAt
        repository { owner { login } name }
        issue { id url }
        pullRequest { id url }
        body
        reactions { totalCount }
      }
    }
  }
}
"#;

pub const COMMIT_COMMENTS: &str = r#"
query userCommitComments($login: String!, $cursor: String) {
  user(login: $login) {
    commitComments(last: 100, before: $cursor) {
      totalCount
      pageInfo { startCursor hasPreviousPage }
      nodes {
        id
        url
        createdAt
        updatedAt
        publishedAt
        lastEditedAt
        commit { id url }
        repository { owner { login } name }
        position
        body
        reactions { totalCount }
      }
    }
  }
}
"#;
